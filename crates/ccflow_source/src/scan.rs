//! Declaration and instantiation patterns over the token stream.

use std::collections::BTreeSet;

use crate::language::HdlLanguage;
use crate::lexer::{Tok, Token};

/// A VHDL entity or Verilog module declaration.
#[derive(Debug, Default)]
pub(crate) struct ScannedUnit {
    pub name: String,
    pub line: u32,
    pub references: BTreeSet<String>,
}

/// A VHDL architecture body, which may live in a different file than its entity.
#[derive(Debug)]
pub(crate) struct ScannedBody {
    pub entity: String,
    pub name: String,
    pub line: u32,
    pub references: BTreeSet<String>,
}

#[derive(Debug, Default)]
pub(crate) struct FileScan {
    pub units: Vec<ScannedUnit>,
    pub bodies: Vec<ScannedBody>,
    /// Packages, configurations and contexts: declarations that are not units.
    pub other_declarations: usize,
    pub problems: Vec<(u32, String)>,
}

impl FileScan {
    pub fn is_empty(&self) -> bool {
        self.units.is_empty() && self.bodies.is_empty() && self.other_declarations == 0
    }
}

pub(crate) fn scan(tokens: &[Token], language: HdlLanguage) -> FileScan {
    match language {
        HdlLanguage::Vhdl => scan_vhdl(tokens),
        HdlLanguage::Verilog | HdlLanguage::SystemVerilog => scan_verilog(tokens),
    }
}

fn ident_at(tokens: &[Token], i: usize) -> Option<&str> {
    tokens.get(i).and_then(Token::ident)
}

fn word_at(tokens: &[Token], i: usize, word: &str) -> bool {
    tokens.get(i).is_some_and(|t| t.is_word(word))
}

fn punct_at(tokens: &[Token], i: usize, c: char) -> bool {
    tokens.get(i).is_some_and(|t| t.is_punct(c))
}

// -- VHDL --

fn scan_vhdl(tokens: &[Token]) -> FileScan {
    let mut scan = FileScan::default();
    let mut owner: Option<usize> = None;
    let mut i = 0;

    while i < tokens.len() {
        let t = &tokens[i];
        let after_end = i > 0 && tokens[i - 1].is_word("end");
        let after_colon = i > 0 && tokens[i - 1].is_punct(':');

        match &t.tok {
            Tok::Ident(w) if w == "entity" && !after_end && !after_colon => {
                owner = None;
                match ident_at(tokens, i + 1) {
                    Some(name) if word_at(tokens, i + 2, "is") => {
                        scan.units.push(ScannedUnit {
                            name: name.to_string(),
                            line: t.line,
                            references: BTreeSet::new(),
                        });
                        i += 3;
                        continue;
                    }
                    _ => scan
                        .problems
                        .push((t.line, "`entity` is not followed by `<name> is`".into())),
                }
            }
            Tok::Ident(w) if w == "architecture" && !after_end => {
                owner = None;
                match (ident_at(tokens, i + 1), ident_at(tokens, i + 3)) {
                    (Some(arch), Some(entity)) if word_at(tokens, i + 2, "of") => {
                        scan.bodies.push(ScannedBody {
                            entity: entity.to_string(),
                            name: arch.to_string(),
                            line: t.line,
                            references: BTreeSet::new(),
                        });
                        owner = Some(scan.bodies.len() - 1);
                        i += 4;
                        continue;
                    }
                    _ => scan.problems.push((
                        t.line,
                        "`architecture` is not followed by `<name> of <entity>`".into(),
                    )),
                }
            }
            Tok::Ident(w) if w == "package" && !after_end => {
                owner = None;
                if ident_at(tokens, i + 1).is_some() {
                    scan.other_declarations += 1;
                }
            }
            Tok::Ident(w)
                if (w == "configuration" || w == "context")
                    && !after_end
                    && !after_colon
                    && ident_at(tokens, i + 1).is_some()
                    && (word_at(tokens, i + 2, "is") || word_at(tokens, i + 2, "of")) =>
            {
                owner = None;
                scan.other_declarations += 1;
            }
            Tok::Punct(':') => {
                if let (Some(body), Some(target)) = (owner, vhdl_instance_target(tokens, i)) {
                    scan.bodies[body].references.insert(target);
                }
            }
            _ => {}
        }
        i += 1;
    }
    scan
}

/// Recognises `label : entity lib.name`, `label : component name` and
/// `label : name generic|port map` at the colon position.
fn vhdl_instance_target(tokens: &[Token], colon: usize) -> Option<String> {
    if colon == 0 || tokens[colon - 1].ident().is_none() {
        return None;
    }
    let head = ident_at(tokens, colon + 1)?;
    match head {
        "entity" => {
            let mut j = colon + 2;
            let mut name = ident_at(tokens, j)?;
            while punct_at(tokens, j + 1, '.') {
                name = ident_at(tokens, j + 2)?;
                j += 2;
            }
            Some(name.to_string())
        }
        "component" => ident_at(tokens, colon + 2).map(str::to_string),
        name => {
            let mapped = (word_at(tokens, colon + 2, "port") || word_at(tokens, colon + 2, "generic"))
                && word_at(tokens, colon + 3, "map");
            mapped.then(|| name.to_string())
        }
    }
}

// -- Verilog / SystemVerilog --

const UNIT_KEYWORDS: &[&str] = &["module", "macromodule", "interface", "primitive", "program"];

const UNIT_END_KEYWORDS: &[&str] = &["endmodule", "endinterface", "endprimitive", "endprogram"];

const VERILOG_KEYWORDS: &[&str] = &[
    "always", "always_comb", "always_ff", "always_latch", "and", "assert", "assign", "assume",
    "automatic", "begin", "bit", "buf", "bufif0", "bufif1", "byte", "case", "casex", "casez",
    "class", "cmos", "const", "cover", "default", "defparam", "disable", "do", "else", "end",
    "endcase", "endfunction", "endgenerate", "endtask", "enum", "event", "extern", "final", "for",
    "force", "forever", "fork", "function", "generate", "genvar", "if", "iff", "import", "initial",
    "inout", "input", "int", "integer", "interface", "join", "localparam", "logic", "longint",
    "modport", "module", "nand", "negedge", "nmos", "nor", "not", "notif0", "notif1", "or",
    "output", "parameter", "pmos", "posedge", "property", "pulldown", "pullup", "rcmos", "real",
    "realtime", "reg", "release", "repeat", "return", "rnmos", "rpmos", "rtran", "rtranif0",
    "rtranif1", "sequence", "shortint", "signed", "specify", "static", "string", "struct",
    "supply0", "supply1", "task", "time", "tran", "tranif0", "tranif1", "tri", "tri0", "tri1",
    "triand", "trior", "type", "typedef", "union", "unique", "unsigned", "var", "void", "wait",
    "wand", "while", "wire", "wor", "xnor", "xor",
];

fn is_keyword(word: &str) -> bool {
    VERILOG_KEYWORDS.contains(&word)
}

fn scan_verilog(tokens: &[Token]) -> FileScan {
    let mut scan = FileScan::default();
    let mut owner: Option<usize> = None;
    let mut i = 0;

    while i < tokens.len() {
        let t = &tokens[i];
        let Some(word) = t.ident() else {
            i += 1;
            continue;
        };

        if UNIT_KEYWORDS.contains(&word) && !(i > 0 && tokens[i - 1].is_punct('.')) {
            let mut j = i + 1;
            if word_at(tokens, j, "automatic") || word_at(tokens, j, "static") {
                j += 1;
            }
            match ident_at(tokens, j) {
                Some(name) if !is_keyword(name) => {
                    scan.units.push(ScannedUnit {
                        name: name.to_string(),
                        line: t.line,
                        references: BTreeSet::new(),
                    });
                    owner = Some(scan.units.len() - 1);
                    i = j + 1;
                    continue;
                }
                _ => scan
                    .problems
                    .push((t.line, format!("`{word}` is not followed by a name"))),
            }
        } else if UNIT_END_KEYWORDS.contains(&word) {
            owner = None;
        } else if word == "package" {
            scan.other_declarations += 1;
        } else if let Some(unit) = owner {
            if let Some(target) = verilog_instance_target(tokens, i) {
                scan.units[unit].references.insert(target);
            }
        }
        i += 1;
    }
    scan
}

/// Index just past the bracket group opening at `open`, or `None` if unbalanced.
fn skip_group(tokens: &[Token], open: usize, left: char, right: char) -> Option<usize> {
    let mut depth = 0usize;
    for (k, t) in tokens.iter().enumerate().skip(open) {
        if t.is_punct(left) {
            depth += 1;
        } else if t.is_punct(right) {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(k + 1);
            }
        }
    }
    None
}

/// Recognises `type [#(...)] inst [range] (` starting at `i`.
fn verilog_instance_target(tokens: &[Token], i: usize) -> Option<String> {
    let type_name = ident_at(tokens, i)?;
    if is_keyword(type_name) {
        return None;
    }
    if i > 0 {
        let prev = &tokens[i - 1];
        if prev.is_punct('.') || prev.is_punct('`') || prev.is_punct('\'') {
            return None;
        }
        if prev.is_word("function") || prev.is_word("task") {
            return None;
        }
    }

    let mut j = i + 1;
    if punct_at(tokens, j, '#') {
        if !punct_at(tokens, j + 1, '(') {
            return None;
        }
        j = skip_group(tokens, j + 1, '(', ')')?;
    }
    let inst = ident_at(tokens, j)?;
    if is_keyword(inst) {
        return None;
    }
    j += 1;
    while punct_at(tokens, j, '[') {
        j = skip_group(tokens, j, '[', ']')?;
    }
    punct_at(tokens, j, '(').then(|| type_name.to_string())
}
