//! Tokenizer and parser for the built-in command language.

use serde::{Deserialize, Serialize};

use crate::core::CompileMode;
use crate::error::CompileError;

/// One piece of a word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Part {
    /// Literal text.
    Lit(String),
    /// `$NAME`, expanded at run time.
    Var(String),
}

/// A command-line word: literal and variable parts, concatenated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word(pub Vec<Part>);

impl Word {
    /// Creates a purely literal word.
    pub fn literal(text: impl Into<String>) -> Self {
        Self(vec![Part::Lit(text.into())])
    }

    /// The word's text if it contains no variables.
    #[must_use]
    pub fn as_literal(&self) -> Option<String> {
        self.0
            .iter()
            .map(|p| match p {
                Part::Lit(s) => Some(s.as_str()),
                Part::Var(_) => None,
            })
            .collect()
    }

    fn push_lit(&mut self, text: &str) {
        if let Some(Part::Lit(last)) = self.0.last_mut() {
            last.push_str(text);
        } else {
            self.0.push(Part::Lit(text.to_string()));
        }
    }

    fn push_char(&mut self, c: char) {
        let mut buf = [0u8; 4];
        self.push_lit(c.encode_utf8(&mut buf));
    }
}

/// Target stream of an echo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    /// Standard output.
    Stdout,
    /// Standard error.
    Stderr,
}

/// A statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    /// `echo WORDS…` / `echoerr WORDS…`
    Echo {
        /// Where the line goes.
        target: Target,
        /// Words joined by single spaces.
        words: Vec<Word>,
    },
    /// `set NAME WORDS…`
    Set {
        /// Variable name.
        name: String,
        /// Value words joined by single spaces.
        words: Vec<Word>,
    },
    /// `unset NAME`
    Unset(String),
    /// `cd [DIR]`
    Cd(Option<Word>),
    /// `true`
    True,
    /// `false`
    False,
    /// `exit [CODE]`
    Exit(Option<i32>),
    /// `fail MSG…`: a shell-level error.
    Fail(Vec<Word>),
    /// `abort MSG…`: an unrecognized fault.
    Abort(Vec<Word>),
    /// `repeat N:` followed by an indented body.
    Repeat {
        /// Iterations.
        count: u32,
        /// Body statements.
        body: Vec<Self>,
    },
}

/// A parsed source: the statements in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Top-level statements.
    pub stmts: Vec<Stmt>,
}

#[derive(Debug)]
enum Line {
    Blank,
    Code {
        lineno: usize,
        indent: usize,
        words: Vec<Word>,
    },
}

fn incomplete(message: &str) -> CompileError {
    CompileError::Incomplete {
        message: message.to_string(),
    }
}

fn syntax(message: impl Into<String>, line: usize, column: usize) -> CompileError {
    CompileError::Syntax {
        message: message.into(),
        line,
        column,
    }
}

const fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

const fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Scanner {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn skip_comment(&mut self) {
        while self.peek().is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn lines(mut self) -> Result<Vec<Line>, CompileError> {
        let mut lines = Vec::new();
        while self.peek().is_some() {
            let lineno = self.line;
            let mut indent = 0;
            while matches!(self.peek(), Some(' ' | '\t')) {
                self.pos += 1;
                indent += 1;
            }
            match self.peek() {
                None => break,
                Some('\n') => {
                    self.bump();
                    // Only a truly empty line closes a block.
                    if indent == 0 {
                        lines.push(Line::Blank);
                    }
                }
                Some('#') => {
                    self.skip_comment();
                    self.bump();
                }
                Some(_) => {
                    let words = self.words()?;
                    lines.push(Line::Code {
                        lineno,
                        indent,
                        words,
                    });
                }
            }
        }
        Ok(lines)
    }

    /// Reads the words of one logical line, consuming its newline.
    fn words(&mut self) -> Result<Vec<Word>, CompileError> {
        let mut words = Vec::new();
        let mut current: Option<Word> = None;

        loop {
            match self.peek() {
                None => break,
                Some('\n') => {
                    self.bump();
                    break;
                }
                Some(' ' | '\t') => {
                    self.pos += 1;
                    words.extend(current.take());
                }
                Some('#') if current.is_none() => self.skip_comment(),
                Some('\\') => match self.peek_at(1) {
                    None => return Err(incomplete("line continuation")),
                    Some('\n') => {
                        self.bump();
                        self.bump();
                        words.extend(current.take());
                    }
                    Some(c) => {
                        self.pos += 2;
                        current.get_or_insert_default().push_char(c);
                    }
                },
                Some('\'') => {
                    self.pos += 1;
                    let word = current.get_or_insert_default();
                    self.single_quoted(word)?;
                }
                Some('"') => {
                    self.pos += 1;
                    let word = current.get_or_insert_default();
                    self.double_quoted(word)?;
                }
                Some('$') => {
                    self.pos += 1;
                    let word = current.get_or_insert_default();
                    self.variable(word);
                }
                Some(c) => {
                    self.pos += 1;
                    current.get_or_insert_default().push_char(c);
                }
            }
        }
        words.extend(current);
        Ok(words)
    }

    fn single_quoted(&mut self, word: &mut Word) -> Result<(), CompileError> {
        word.push_lit("");
        loop {
            match self.bump() {
                None => return Err(incomplete("unterminated string")),
                Some('\'') => return Ok(()),
                Some('\\') if matches!(self.peek(), Some('\'' | '\\')) => {
                    if let Some(c) = self.bump() {
                        word.push_char(c);
                    }
                }
                Some(c) => word.push_char(c),
            }
        }
    }

    fn double_quoted(&mut self, word: &mut Word) -> Result<(), CompileError> {
        word.push_lit("");
        loop {
            match self.bump() {
                None => return Err(incomplete("unterminated string")),
                Some('"') => return Ok(()),
                Some('\\') => match self.bump() {
                    None => return Err(incomplete("unterminated string")),
                    Some('n') => word.push_char('\n'),
                    Some('t') => word.push_char('\t'),
                    Some(c @ ('"' | '\\' | '$')) => word.push_char(c),
                    Some('\n') => {}
                    Some(c) => {
                        word.push_char('\\');
                        word.push_char(c);
                    }
                },
                Some('$') => self.variable(word),
                Some(c) => word.push_char(c),
            }
        }
    }

    /// Reads a variable name after `$`. A `$` not followed by a name is
    /// literal.
    fn variable(&mut self, word: &mut Word) {
        if !self.peek().is_some_and(is_name_start) {
            word.push_char('$');
            return;
        }
        let start = self.pos;
        while self.peek().is_some_and(is_name_char) {
            self.pos += 1;
        }
        let name: String = self.chars[start..self.pos].iter().collect();
        word.0.push(Part::Var(name));
    }
}

/// Parses `source` in `mode`.
///
/// In `Single` mode a `repeat` block must be closed by a blank line; until
/// then the source is incomplete. In `Exec` mode the end of input also
/// closes it.
///
/// # Errors
///
/// Returns [`CompileError::Incomplete`] for an unfinished string, line
/// continuation or block, and [`CompileError::Syntax`] otherwise.
pub fn parse(source: &str, mode: CompileMode) -> Result<Program, CompileError> {
    let lines = Scanner::new(source).lines()?;
    let mut parser = Parser {
        lines,
        pos: 0,
        mode,
    };
    parser.program()
}

struct Parser {
    lines: Vec<Line>,
    pos: usize,
    mode: CompileMode,
}

impl Parser {
    fn program(&mut self) -> Result<Program, CompileError> {
        let mut stmts = Vec::new();
        let mut top_indent = None;

        while let Some(line) = self.lines.get(self.pos) {
            let Line::Code { lineno, indent, .. } = *line else {
                self.pos += 1;
                continue;
            };
            let expected = *top_indent.get_or_insert(indent);
            if indent != expected {
                return Err(syntax("unexpected indent", lineno, indent + 1));
            }
            stmts.push(self.statement()?);
        }
        Ok(Program { stmts })
    }

    fn statement(&mut self) -> Result<Stmt, CompileError> {
        let Some(Line::Code {
            lineno,
            indent,
            words,
        }) = self.lines.get(self.pos)
        else {
            return Err(CompileError::Other("expected a statement".to_string()));
        };
        let (lineno, indent) = (*lineno, *indent);
        let words = words.clone();
        self.pos += 1;

        let column = indent + 1;
        let Some((head, args)) = words.split_first() else {
            return Err(syntax("empty statement", lineno, column));
        };
        let Some(command) = head.as_literal() else {
            return Err(syntax("command name must be literal", lineno, column));
        };

        let stmt = match command.as_str() {
            "echo" => Stmt::Echo {
                target: Target::Stdout,
                words: args.to_vec(),
            },
            "echoerr" => Stmt::Echo {
                target: Target::Stderr,
                words: args.to_vec(),
            },
            "set" => {
                let (name, rest) = args
                    .split_first()
                    .ok_or_else(|| syntax("set: missing variable name", lineno, column))?;
                Stmt::Set {
                    name: identifier(name, "set", lineno, column)?,
                    words: rest.to_vec(),
                }
            }
            "unset" => match args {
                [name] => Stmt::Unset(identifier(name, "unset", lineno, column)?),
                _ => return Err(syntax("unset: expected one name", lineno, column)),
            },
            "cd" => match args {
                [] => Stmt::Cd(None),
                [dir] => Stmt::Cd(Some(dir.clone())),
                _ => return Err(syntax("cd: too many arguments", lineno, column)),
            },
            "true" | "false" if !args.is_empty() => {
                return Err(syntax(format!("{command}: takes no arguments"), lineno, column));
            }
            "true" => Stmt::True,
            "false" => Stmt::False,
            "exit" => match args {
                [] => Stmt::Exit(None),
                [code] => {
                    let code = code
                        .as_literal()
                        .and_then(|c| c.parse::<i32>().ok())
                        .ok_or_else(|| syntax("exit: code must be an integer", lineno, column))?;
                    Stmt::Exit(Some(code))
                }
                _ => return Err(syntax("exit: too many arguments", lineno, column)),
            },
            "fail" => Stmt::Fail(args.to_vec()),
            "abort" => Stmt::Abort(args.to_vec()),
            "repeat" => {
                let count = repeat_count(args, lineno, column)?;
                let body = self.block(indent, lineno)?;
                Stmt::Repeat { count, body }
            }
            other => {
                return Err(syntax(format!("unknown command: {other}"), lineno, column));
            }
        };
        Ok(stmt)
    }

    /// Parses the body of a block whose header sits at `header_indent`.
    fn block(&mut self, header_indent: usize, header_line: usize) -> Result<Vec<Stmt>, CompileError> {
        let mut body = Vec::new();
        let mut body_indent = None;

        loop {
            let Some(line) = self.lines.get(self.pos) else {
                if self.mode == CompileMode::Single {
                    return Err(incomplete("block not terminated by a blank line"));
                }
                break;
            };
            let Line::Code { lineno, indent, .. } = *line else {
                break;
            };
            if indent <= header_indent {
                break;
            }
            let expected = *body_indent.get_or_insert(indent);
            if indent > expected {
                return Err(syntax("unexpected indent", lineno, indent + 1));
            }
            if indent < expected {
                return Err(syntax(
                    "unindent does not match the block's indentation",
                    lineno,
                    indent + 1,
                ));
            }
            body.push(self.statement()?);
        }

        if body.is_empty() {
            return Err(syntax("expected an indented block", header_line + 1, 1));
        }
        Ok(body)
    }
}

fn identifier(word: &Word, command: &str, line: usize, column: usize) -> Result<String, CompileError> {
    word.as_literal()
        .filter(|n| n.chars().next().is_some_and(is_name_start) && n.chars().all(is_name_char))
        .ok_or_else(|| syntax(format!("{command}: invalid variable name"), line, column))
}

fn repeat_count(args: &[Word], line: usize, column: usize) -> Result<u32, CompileError> {
    let text: Option<String> = args.iter().map(Word::as_literal).collect();
    let text = text.ok_or_else(|| syntax("repeat: count must be literal", line, column))?;
    let count = text
        .strip_suffix(':')
        .ok_or_else(|| syntax("repeat: expected ':' after the count", line, column))?;
    count
        .trim()
        .parse::<u32>()
        .map_err(|_| syntax("repeat: count must be a non-negative integer", line, column))
}
