//! Minimal `go.mod` reader and writer
//!
//! The file is held as its statements in source order, so a rewrite only
//! touches the entries that were edited. Comments, blank lines and
//! directives without a typed accessor here (`godebug`, `tool`, `ignore`
//! and anything newer) are written back as they were read.

use anyhow::{anyhow, bail, Context, Result};
use std::fmt::Write as _;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Require {
    pub path: String,
    pub version: String,
    pub indirect: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
}

/// Arguments of one directive and the comment trailing it
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    args: Vec<String>,
    comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Item {
    Blank,
    Comment(String),
    Entry(Entry),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stmt {
    Blank,
    Comment(String),
    Line {
        verb: String,
        entry: Entry,
    },
    Block {
        verb: String,
        open_comment: Option<String>,
        items: Vec<Item>,
        close_comment: Option<String>,
    },
}

struct OpenBlock {
    verb: String,
    comment: Option<String>,
    items: Vec<Item>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoMod {
    stmts: Vec<Stmt>,
}

impl GoMod {
    pub fn parse(content: &str) -> Result<GoMod> {
        let mut stmts = Vec::new();
        let mut block: Option<OpenBlock> = None;

        for (n, raw) in content.lines().enumerate() {
            let line = n + 1;
            let (code, comment) = split_comment(raw);
            let fields =
                tokenize(code).with_context(|| format!("go.mod line {}", line))?;

            if block.is_some() {
                if fields.len() == 1 && fields[0] == ")" {
                    if let Some(open) = block.take() {
                        stmts.push(Stmt::Block {
                            verb: open.verb,
                            open_comment: open.comment,
                            items: open.items,
                            close_comment: comment,
                        });
                    }
                } else if let Some(open) = block.as_mut() {
                    let item = if fields.is_empty() {
                        comment.map_or(Item::Blank, Item::Comment)
                    } else {
                        check_directive(&open.verb, &fields, line)?;
                        Item::Entry(Entry {
                            args: fields,
                            comment,
                        })
                    };
                    open.items.push(item);
                }
                continue;
            }

            let Some((verb, args)) = fields.split_first() else {
                stmts.push(comment.map_or(Stmt::Blank, Stmt::Comment));
                continue;
            };
            match args {
                [open] if open == "(" => {
                    block = Some(OpenBlock {
                        verb: verb.clone(),
                        comment,
                        items: Vec::new(),
                    });
                }
                [open, close] if open == "(" && close == ")" => stmts.push(Stmt::Block {
                    verb: verb.clone(),
                    open_comment: None,
                    items: Vec::new(),
                    close_comment: comment,
                }),
                _ => {
                    check_directive(verb, args, line)?;
                    stmts.push(Stmt::Line {
                        verb: verb.clone(),
                        entry: Entry {
                            args: args.to_vec(),
                            comment,
                        },
                    });
                }
            }
        }

        if let Some(open) = block {
            bail!("unterminated {} block in go.mod", open.verb);
        }
        let m = GoMod { stmts };
        if m.module().is_empty() {
            bail!("go.mod has no module directive");
        }
        Ok(m)
    }

    pub fn module(&self) -> &str {
        self.first_arg("module").unwrap_or_default()
    }

    pub fn go_version(&self) -> Option<&str> {
        self.first_arg("go")
    }

    pub fn toolchain(&self) -> Option<&str> {
        self.first_arg("toolchain")
    }

    /// Arguments of every `verb` entry, single-line and block form alike
    pub fn directive(&self, verb: &str) -> Vec<&[String]> {
        self.entries(verb)
            .into_iter()
            .map(|e| e.args.as_slice())
            .collect()
    }

    pub fn requires(&self) -> Vec<Require> {
        self.entries("require")
            .into_iter()
            .map(|e| Require {
                path: e.args[0].clone(),
                version: e.args[1].clone(),
                indirect: e.comment.as_deref().map_or(false, is_indirect),
            })
            .collect()
    }

    pub fn replaces(&self) -> Vec<Replace> {
        self.entries("replace")
            .into_iter()
            .filter_map(|e| {
                let arrow = e.args.iter().position(|a| a == "=>")?;
                let (old, new) = (&e.args[..arrow], &e.args[arrow + 1..]);
                Some(Replace {
                    old_path: old.first()?.clone(),
                    old_version: old.get(1).cloned(),
                    new_path: new.first()?.clone(),
                    new_version: new.get(1).cloned(),
                })
            })
            .collect()
    }

    pub fn require_version(&self, path: &str) -> Option<&str> {
        self.entries("require")
            .into_iter()
            .find(|e| e.args[0] == path)
            .map(|e| e.args[1].as_str())
    }

    pub fn set_go(&mut self, version: &str) {
        for stmt in &mut self.stmts {
            if let Stmt::Line { verb, entry } = stmt {
                if verb == "go" {
                    entry.args = vec![version.to_string()];
                    return;
                }
            }
        }
        let at = self
            .stmts
            .iter()
            .position(|s| matches!(s, Stmt::Line { verb, .. } if verb == "module"))
            .map_or(0, |i| i + 1);
        let go = Stmt::Line {
            verb: "go".to_string(),
            entry: Entry {
                args: vec![version.to_string()],
                comment: None,
            },
        };
        self.stmts.insert(at, go);
        self.stmts.insert(at, Stmt::Blank);
    }

    pub fn drop_replace(&mut self, old_path: &str) {
        self.remove_entries("replace", |args| args.first().map(String::as_str) == Some(old_path));
    }

    /// Replace `old_path` (any version) with a local directory
    pub fn add_replace(&mut self, old_path: &str, new_path: &str) {
        self.drop_replace(old_path);
        self.push_entry(
            "replace",
            vec![old_path.to_string(), "=>".to_string(), new_path.to_string()],
        );
    }

    pub fn drop_require(&mut self, path: &str) {
        self.remove_entries("require", |args| args.first().map(String::as_str) == Some(path));
    }

    pub fn add_require(&mut self, path: &str, version: &str) {
        if let Some(existing) = self
            .entries_mut("require")
            .into_iter()
            .find(|e| e.args[0] == path)
        {
            existing.args[1] = version.to_string();
            existing.comment = existing.comment.take().and_then(|c| without_indirect(&c));
            return;
        }
        self.push_entry("require", vec![path.to_string(), version.to_string()]);
    }

    pub fn format(&self) -> String {
        let mut out = String::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Blank => out.push('\n'),
                Stmt::Comment(c) => {
                    let _ = writeln!(out, "{}", c);
                }
                Stmt::Line { verb, entry } => {
                    let _ = writeln!(out, "{} {}", verb, format_entry(entry));
                }
                Stmt::Block {
                    verb,
                    open_comment,
                    items,
                    close_comment,
                } => {
                    let _ = writeln!(out, "{} ({}", verb, suffix(open_comment));
                    for item in items {
                        match item {
                            Item::Blank => out.push('\n'),
                            Item::Comment(c) => {
                                let _ = writeln!(out, "\t{}", c);
                            }
                            Item::Entry(entry) => {
                                let _ = writeln!(out, "\t{}", format_entry(entry));
                            }
                        }
                    }
                    let _ = writeln!(out, "){}", suffix(close_comment));
                }
            }
        }
        out
    }

    fn first_arg(&self, verb: &str) -> Option<&str> {
        self.entries(verb)
            .into_iter()
            .next()
            .and_then(|e| e.args.first())
            .map(String::as_str)
    }

    fn entries(&self, verb: &str) -> Vec<&Entry> {
        let mut out = Vec::new();
        for stmt in &self.stmts {
            match stmt {
                Stmt::Line { verb: v, entry } if v == verb => out.push(entry),
                Stmt::Block { verb: v, items, .. } if v == verb => {
                    out.extend(items.iter().filter_map(|item| match item {
                        Item::Entry(e) => Some(e),
                        _ => None,
                    }));
                }
                _ => {}
            }
        }
        out
    }

    fn entries_mut(&mut self, verb: &str) -> Vec<&mut Entry> {
        let mut out = Vec::new();
        for stmt in &mut self.stmts {
            match stmt {
                Stmt::Line { verb: v, entry } if v == verb => out.push(entry),
                Stmt::Block { verb: v, items, .. } if v == verb => {
                    out.extend(items.iter_mut().filter_map(|item| match item {
                        Item::Entry(e) => Some(e),
                        _ => None,
                    }));
                }
                _ => {}
            }
        }
        out
    }

    /// Remove matching entries, dropping blocks left without entries and
    /// the blank lines that surrounded removed statements
    fn remove_entries(&mut self, verb: &str, hit: impl Fn(&[String]) -> bool) {
        let before = self.stmts.len();
        self.stmts.retain_mut(|stmt| match stmt {
            Stmt::Line { verb: v, entry } if v == verb => !hit(&entry.args),
            Stmt::Block { verb: v, items, .. } if v == verb => {
                items.retain(|item| !matches!(item, Item::Entry(e) if hit(&e.args)));
                items.iter().any(|item| matches!(item, Item::Entry(_)))
            }
            _ => true,
        });
        if self.stmts.len() != before {
            self.collapse_blanks();
        }
    }

    fn collapse_blanks(&mut self) {
        let mut previous_blank = false;
        self.stmts.retain(|stmt| {
            let blank = matches!(stmt, Stmt::Blank);
            let keep = !(blank && previous_blank);
            previous_blank = blank;
            keep
        });
        while matches!(self.stmts.last(), Some(Stmt::Blank)) {
            self.stmts.pop();
        }
    }

    /// Append an entry to the last `verb` block, else after the last
    /// single-line `verb`, else as a new statement at the end
    fn push_entry(&mut self, verb: &str, args: Vec<String>) {
        let entry = Entry {
            args,
            comment: None,
        };
        let last_block = self
            .stmts
            .iter()
            .rposition(|s| matches!(s, Stmt::Block { verb: v, .. } if v == verb));
        if let Some(Stmt::Block { items, .. }) = last_block.and_then(|i| self.stmts.get_mut(i)) {
            items.push(Item::Entry(entry));
            return;
        }

        let line = Stmt::Line {
            verb: verb.to_string(),
            entry,
        };
        let last_line = self
            .stmts
            .iter()
            .rposition(|s| matches!(s, Stmt::Line { verb: v, .. } if v == verb));
        match last_line {
            Some(i) => self.stmts.insert(i + 1, line),
            None => {
                if !self.stmts.is_empty() {
                    self.stmts.push(Stmt::Blank);
                }
                self.stmts.push(line);
            }
        }
    }
}

/// Argument shape checks for the directives this module reads
fn check_directive(verb: &str, args: &[String], line: usize) -> Result<()> {
    let bad = || anyhow!("go.mod line {}: malformed {} directive", line, verb);
    let ok = match verb {
        "module" | "go" | "toolchain" => args.len() == 1,
        "require" | "exclude" => args.len() == 2,
        "replace" => {
            let arrow = args.iter().position(|a| a == "=>").ok_or_else(bad)?;
            let (old, new) = (&args[..arrow], &args[arrow + 1..]);
            (1..=2).contains(&old.len()) && (1..=2).contains(&new.len())
        }
        "retract" => !args.is_empty(),
        _ => true,
    };
    if ok {
        Ok(())
    } else {
        Err(bad())
    }
}

fn format_entry(entry: &Entry) -> String {
    let mut line = entry
        .args
        .iter()
        .map(|a| quote(a.as_str()))
        .collect::<Vec<_>>()
        .join(" ");
    line.push_str(&suffix(&entry.comment));
    line
}

fn suffix(comment: &Option<String>) -> String {
    comment
        .as_deref()
        .map(|c| format!(" {}", c))
        .unwrap_or_default()
}

fn is_indirect(comment: &str) -> bool {
    let text = comment.trim_start_matches("//").trim();
    text == "indirect" || text.starts_with("indirect;")
}

/// The comment with its `indirect` marker removed, if anything remains
fn without_indirect(comment: &str) -> Option<String> {
    if !is_indirect(comment) {
        return Some(comment.to_string());
    }
    let rest = comment
        .trim_start_matches("//")
        .trim()
        .trim_start_matches("indirect")
        .trim_start_matches(';')
        .trim();
    (!rest.is_empty()).then(|| format!("// {}", rest))
}

/// Split a line at the first `//` outside a quoted string
fn split_comment(line: &str) -> (&str, Option<String>) {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = line.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '`' => quote = Some(c),
            None if c == '/' && chars.peek().map(|(_, n)| *n) == Some('/') => {
                return (&line[..i], Some(line[i..].trim_end().to_string()));
            }
            None => {}
        }
    }
    (line, None)
}

/// Split directive text into arguments. Quoted strings are unquoted and
/// parentheses stand alone.
fn tokenize(code: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut chars = code.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' | ')' => {
                chars.next();
                fields.push(c.to_string());
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('\\') => match chars.next() {
                            Some(escaped) => value.push(escaped),
                            None => bail!("unterminated quoted string"),
                        },
                        Some('"') => break,
                        Some(other) => value.push(other),
                        None => bail!("unterminated quoted string"),
                    }
                }
                fields.push(value);
            }
            '`' => {
                chars.next();
                let mut value = String::new();
                loop {
                    match chars.next() {
                        Some('`') => break,
                        Some(other) => value.push(other),
                        None => bail!("unterminated raw string"),
                    }
                }
                fields.push(value);
            }
            _ => {
                let mut value = String::new();
                while let Some(&n) = chars.peek() {
                    if n.is_whitespace() || matches!(n, '(' | ')' | '"' | '`') {
                        break;
                    }
                    value.push(n);
                    chars.next();
                }
                fields.push(value);
            }
        }
    }
    Ok(fields)
}

fn quote(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains("//")
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | '"' | '`' | '\\'));
    if needs_quotes {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAFFOLD: &str = "module s

go 1.21

require (
\tfunction v0.0.0-00010101000000-000000000000
\tknative.dev/func-go v0.21.3
\tgithub.com/rs/zerolog v1.33.0 // indirect
)

replace function => ./f
";

    #[test]
    fn test_parse_blocks_and_single_lines() {
        let m = GoMod::parse(SCAFFOLD).unwrap();
        assert_eq!(m.module(), "s");
        assert_eq!(m.go_version(), Some("1.21"));
        let requires = m.requires();
        assert_eq!(requires.len(), 3);
        assert!(requires[2].indirect);
        assert_eq!(m.require_version("knative.dev/func-go"), Some("v0.21.3"));
        assert_eq!(m.replaces()[0].new_path, "./f");
        assert_eq!(m.format(), SCAFFOLD);
    }

    #[test]
    fn test_rewrite_placeholder_module() {
        let mut m = GoMod::parse(SCAFFOLD).unwrap();
        m.set_go("1.22");
        m.drop_replace("function");
        m.add_replace("example.com/hello", "./f");
        m.drop_require("function");
        m.add_require("example.com/hello", "v0.0.0-00010101000000-000000000000");

        let out = m.format();
        assert!(out.contains("go 1.22\n"));
        assert!(out.contains("\nreplace example.com/hello => ./f\n"));
        assert!(out.contains("\texample.com/hello v0.0.0-00010101000000-000000000000\n"));
        assert!(!out.contains("function "));
        assert!(!out.contains("\n\n\n"));

        let reparsed = GoMod::parse(&out).unwrap();
        assert_eq!(reparsed, m);
    }

    #[test]
    fn test_versioned_replace() {
        let m = GoMod::parse("module x\nreplace a v1.0.0 => b v1.1.0\n").unwrap();
        assert_eq!(m.replaces()[0].old_version.as_deref(), Some("v1.0.0"));
        assert!(m.format().contains("replace a v1.0.0 => b v1.1.0"));
    }

    #[test]
    fn test_missing_module_is_error() {
        assert!(GoMod::parse("go 1.21\n").is_err());
        assert!(GoMod::parse("module x\nrequire (\n a v1\n").is_err());
        assert!(GoMod::parse("module x\nrequire a\n").is_err());
        assert!(GoMod::parse("module \"x\n").is_err());
    }

    #[test]
    fn test_godebug_is_kept() {
        let src = "module f\n\ngo 1.23\n\ngodebug default=go1.21\n\ngodebug (\n\tpanicnil=1\n\tasynctimerchan=0\n)\n";
        let mut m = GoMod::parse(src).unwrap();
        assert_eq!(m.format(), src);
        assert_eq!(m.directive("godebug").len(), 3);

        m.set_go("1.24");
        assert!(m.format().contains("godebug default=go1.21\n"));
        assert!(m.format().contains("\tasynctimerchan=0\n"));
    }

    #[test]
    fn test_tool_is_kept() {
        let src = "module f\n\ngo 1.24\n\ntool golang.org/x/tools/cmd/stringer\n\nrequire golang.org/x/tools v0.30.0\n";
        let mut m = GoMod::parse(src).unwrap();
        assert_eq!(m.format(), src);
        assert_eq!(
            m.directive("tool"),
            vec![&["golang.org/x/tools/cmd/stringer".to_string()][..]]
        );

        m.add_require("example.com/extra", "v1.0.0");
        let out = m.format();
        assert!(out.contains("tool golang.org/x/tools/cmd/stringer\n"));
        assert!(out.contains(
            "require golang.org/x/tools v0.30.0\nrequire example.com/extra v1.0.0\n"
        ));
    }

    #[test]
    fn test_comments_are_kept() {
        let src = "// Module for the hello function.
module example.com/hello // trailing

go 1.22

require (
\t// logging
\tgithub.com/rs/zerolog v1.33.0 // indirect; pulled in by func-go
\tknative.dev/func-go v0.21.3 // pinned
) // end of requires

replace example.com/old => \"./vendor//old\" // local copy
";
        let mut m = GoMod::parse(src).unwrap();
        assert_eq!(m.format(), src);
        assert_eq!(m.module(), "example.com/hello");
        assert!(m.requires()[0].indirect);
        assert_eq!(m.replaces()[0].new_path, "./vendor//old");

        m.add_require("github.com/rs/zerolog", "v1.34.0");
        m.add_require("example.com/more", "v0.1.0");
        let out = m.format();
        assert!(out.starts_with("// Module for the hello function.\n"));
        assert!(out.contains("\t// logging\n"));
        assert!(out.contains("\tgithub.com/rs/zerolog v1.34.0 // pulled in by func-go\n"));
        assert!(out.contains("\tknative.dev/func-go v0.21.3 // pinned\n"));
        assert!(out.contains("\texample.com/more v0.1.0\n) // end of requires\n"));
        assert!(out.contains("replace example.com/old => \"./vendor//old\" // local copy\n"));
    }

    #[test]
    fn test_dropping_last_entry_removes_block() {
        let mut m = GoMod::parse("module x\n\nrequire (\n\ta v1\n)\n\ngo 1.21\n").unwrap();
        m.drop_require("a");
        assert_eq!(m.format(), "module x\n\ngo 1.21\n");
    }
}
