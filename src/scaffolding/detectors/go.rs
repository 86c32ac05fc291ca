use super::golex::{tokenize, Token};
use super::Detector;
use crate::error::{FunctionError, Result};
use anyhow::{anyhow, bail};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Detects Go signatures from package-level declarations.
///
/// `func New()` (no receiver, no parameters) marks an instanced function,
/// `func Handle(...)` (no receiver) a static one. Only `.go` files directly
/// in the source directory are considered; files that do not parse are
/// skipped.
#[derive(Debug, Default)]
pub struct GoDetector;

/// A package-level function declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDecl {
    pub name: String,
    pub has_receiver: bool,
    pub param_count: usize,
}

impl Detector for GoDetector {
    fn detect(&self, dir: &Path) -> Result<(bool, bool)> {
        let entries = fs::read_dir(dir).map_err(|e| FunctionError::io(dir, e))?;
        let mut files: Vec<_> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map_or(false, |ext| ext == "go"))
            .collect();
        files.sort();

        let (mut is_static, mut instanced) = (false, false);
        for file in files {
            let Ok(src) = fs::read_to_string(&file) else {
                continue;
            };
            let decls = match parse_top_level_funcs(&src) {
                Ok(decls) => decls,
                Err(e) => {
                    debug!(file = %file.display(), error = %e, "skipping unparseable Go file");
                    continue;
                }
            };
            for decl in decls.iter().filter(|d| !d.has_receiver) {
                if decl.name == "New" && decl.param_count == 0 {
                    instanced = true;
                }
                if decl.name == "Handle" {
                    is_static = true;
                }
            }
        }
        Ok((is_static, instanced))
    }
}

/// Parse a Go source file and return its package-level function
/// declarations. Requires a leading `package` clause.
pub fn parse_top_level_funcs(src: &str) -> anyhow::Result<Vec<FuncDecl>> {
    let tokens = tokenize(src)?;
    let mut p = Parser { tokens, pos: 0 };

    p.skip_semicolons();
    if !p.next_is_ident("package") {
        bail!("missing package clause");
    }
    p.pos += 1;
    match p.advance() {
        Some(Token::Ident(_)) => {}
        _ => bail!("missing package name"),
    }
    p.expect_semicolon()?;

    let mut decls = Vec::new();
    loop {
        p.skip_semicolons();
        match p.peek() {
            None => break,
            Some(t) if t.is_ident("func") => {
                p.pos += 1;
                decls.push(p.func_decl()?);
            }
            Some(_) => p.skip_declaration()?,
        }
    }
    Ok(decls)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn next_is_ident(&self, name: &str) -> bool {
        self.peek().map_or(false, |t| t.is_ident(name))
    }

    fn next_is_op(&self, op: &str) -> bool {
        self.peek().map_or(false, |t| t.is_op(op))
    }

    fn skip_semicolons(&mut self) {
        while self.peek() == Some(&Token::Semicolon) {
            self.pos += 1;
        }
    }

    fn expect_semicolon(&mut self) -> anyhow::Result<()> {
        match self.advance() {
            Some(Token::Semicolon) | None => Ok(()),
            Some(other) => Err(anyhow!("expected ';', found {:?}", other)),
        }
    }

    /// Consume a balanced group starting at the opening token, returning
    /// the tokens strictly inside it.
    fn group(&mut self, open: &str, close: &str) -> anyhow::Result<Vec<Token>> {
        if !self.next_is_op(open) {
            bail!("expected '{}'", open);
        }
        self.pos += 1;
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(token) = self.advance() {
            if let Token::Op(op) = &token {
                match op.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth -= 1;
                        if depth == 0 {
                            if op != close {
                                bail!("mismatched '{}'", op);
                            }
                            return Ok(self.tokens[start..self.pos - 1].to_vec());
                        }
                    }
                    _ => {}
                }
            }
        }
        bail!("unbalanced '{}'", open)
    }

    fn func_decl(&mut self) -> anyhow::Result<FuncDecl> {
        let has_receiver = self.next_is_op("(");
        if has_receiver {
            self.group("(", ")")?;
        }
        let name = match self.advance() {
            Some(Token::Ident(name)) => name,
            other => bail!("expected function name, found {:?}", other),
        };
        if self.next_is_op("[") {
            self.group("[", "]")?;
        }
        let params = self.group("(", ")")?;
        let decl = FuncDecl {
            name,
            has_receiver,
            param_count: count_params(&params),
        };
        self.skip_declaration()?;
        Ok(decl)
    }

    /// Skip to the semicolon terminating the current declaration, stepping
    /// over bracketed groups (bodies, import lists, struct types).
    fn skip_declaration(&mut self) -> anyhow::Result<()> {
        let mut depth = 0usize;
        while let Some(token) = self.advance() {
            match &token {
                Token::Semicolon if depth == 0 => return Ok(()),
                Token::Op(op) => match op.as_str() {
                    "(" | "[" | "{" => depth += 1,
                    ")" | "]" | "}" => {
                        depth = depth
                            .checked_sub(1)
                            .ok_or_else(|| anyhow!("unexpected '{}'", op))?;
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        if depth != 0 {
            bail!("unexpected end of file");
        }
        Ok(())
    }
}

/// Number of comma-separated parameter entries at the top level of a list
fn count_params(params: &[Token]) -> usize {
    if params.is_empty() {
        return 0;
    }
    let mut depth = 0usize;
    let mut count = 1;
    for (i, token) in params.iter().enumerate() {
        if let Token::Op(op) = token {
            match op.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth = depth.saturating_sub(1),
                // A trailing comma does not start another entry.
                "," if depth == 0 && i + 1 < params.len() => count += 1,
                _ => {}
            }
        }
    }
    count
}
