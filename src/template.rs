//! Redirect url templates.
//!
//! A template mixes literal text, value expansions and post-apply
//! instructions:
//!
//! ```text
//! https://{hostname}/new{pathname|/^\/old//}[search.ref={origin|encodeURIComponent}]
//! ```
//!
//! - `{name}` / `{name|manipulations}` expands a url component (or a query
//!   parameter with `search.KEY`) of the original url, piped through a
//!   [`Pipeline`].
//! - `[name=template]` sets a component on the assembled url, evaluating
//!   its value template against that url.

use tracing::debug;

use crate::error::{ControlError, Result};
use crate::manipulation::Pipeline;
use crate::url::{query_param, Component, UrlParser};

/// Characters that end a parameter name
const NAME_TERMINATORS: &[char] = &['/', ':', '|', '}', '=', ']'];

/// Value source or target of a template block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRef {
    Component(Component),
    /// Named query parameter (`search.KEY`)
    SearchParam(String),
}

impl ParamRef {
    /// Resolve a parameter name. Unknown names are rejected here, not when
    /// the template is applied.
    pub fn parse(name: &str) -> Result<Self> {
        if let Some(key) = name.strip_prefix("search.") {
            if key.is_empty() {
                return Err(ControlError::UnknownParameter(name.to_string()));
            }
            return Ok(ParamRef::SearchParam(key.to_string()));
        }
        Component::from_name(name)
            .map(ParamRef::Component)
            .ok_or_else(|| ControlError::UnknownParameter(name.to_string()))
    }

    /// Current value; a missing query parameter reads as empty.
    pub fn get(&self, url: &UrlParser) -> String {
        match self {
            ParamRef::Component(component) => component.get(url),
            ParamRef::SearchParam(key) => query_param(url.query(), key)
                .unwrap_or_default()
                .to_string(),
        }
    }

    pub fn set(&self, url: &mut UrlParser, value: &str) {
        match self {
            ParamRef::Component(component) => component.set(url, value),
            ParamRef::SearchParam(key) => url.query_parser().set(key, value),
        }
    }
}

/// `{param|manipulations}`
#[derive(Debug, Clone)]
pub struct Expansion {
    pub param: ParamRef,
    pub pipeline: Pipeline,
}

impl Expansion {
    fn parse(body: &str) -> Result<Self> {
        let (name, rest) = split_name(body);
        Ok(Self {
            param: ParamRef::parse(name)?,
            pipeline: Pipeline::parse(rest),
        })
    }

    pub fn resolve(&self, url: &UrlParser) -> String {
        self.pipeline.apply(&self.param.get(url))
    }
}

#[derive(Debug, Clone)]
pub enum Segment {
    Literal(String),
    Expansion(Expansion),
}

/// `[param=template]`
#[derive(Debug, Clone)]
pub struct Instruction {
    pub param: ParamRef,
    pub value: Vec<Segment>,
}

impl Instruction {
    fn parse(body: &str) -> Result<Self> {
        let (name, rest) = split_name(body);
        let value = rest
            .strip_prefix('=')
            .ok_or_else(|| ControlError::InvalidPattern(format!("[{}]", body)))?;
        Ok(Self {
            param: ParamRef::parse(name)?,
            value: parse_segments(value, false)?.0,
        })
    }

    fn apply(&self, url: &mut UrlParser) {
        let value = resolve_segments(&self.value, url);
        self.param.set(url, &value);
    }
}

/// Compiled redirect template
#[derive(Debug, Clone, Default)]
pub struct Template {
    segments: Vec<Segment>,
    instructions: Vec<Instruction>,
}

impl Template {
    pub fn parse(input: &str) -> Result<Self> {
        let (segments, instructions) = parse_segments(input, true)?;
        debug!(
            template = input,
            segments = segments.len(),
            instructions = instructions.len(),
            "compiled redirect template"
        );
        Ok(Self {
            segments,
            instructions,
        })
    }

    /// Rewrite `url`: assemble the main url from the segments (when there
    /// are any), then run each instruction in declared order.
    pub fn apply(&self, url: &str) -> String {
        let mut parser = UrlParser::new(url);
        if !self.segments.is_empty() {
            let href = resolve_segments(&self.segments, &parser);
            parser.set_href(href);
        }
        for instruction in &self.instructions {
            instruction.apply(&mut parser);
        }
        parser.into_href()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }
}

fn resolve_segments(segments: &[Segment], url: &UrlParser) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Expansion(expansion) => expansion.resolve(url),
        })
        .collect()
}

/// Split a block body into its parameter name and the remainder.
fn split_name(body: &str) -> (&str, &str) {
    match body.find(NAME_TERMINATORS) {
        Some(end) => (&body[..end], &body[end..]),
        None => (body, ""),
    }
}

/// `[` opens an instruction only when it is followed by a known parameter
/// and `=`; any other bracket is literal text.
fn opens_instruction(rest: &str) -> bool {
    let (name, after) = split_name(rest);
    after.starts_with('=') && ParamRef::parse(name).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Literal,
    InExpansion,
    InInstruction,
}

#[derive(Debug, PartialEq, Eq)]
enum Token<'a> {
    Literal(&'a str),
    Expansion(&'a str),
    Instruction(&'a str),
}

/// Single pass over the template. Inside a block, `{`/`[` and `}`/`]` are
/// counted so manipulation patterns may contain them; an unclosed block is
/// kept as literal text.
fn tokenize(input: &str, allow_instructions: bool) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut state = State::Literal;
    let mut start = 0;
    let mut open = 0;
    let mut depth = 0usize;

    for (i, c) in input.char_indices() {
        match state {
            State::Literal => {
                let next = match c {
                    '{' => Some(State::InExpansion),
                    '[' if allow_instructions && opens_instruction(&input[i + 1..]) => {
                        Some(State::InInstruction)
                    }
                    _ => None,
                };
                if let Some(next) = next {
                    if start < i {
                        tokens.push(Token::Literal(&input[start..i]));
                    }
                    state = next;
                    open = i;
                    start = i + 1;
                    depth = 0;
                }
            }
            State::InExpansion | State::InInstruction => match c {
                '{' | '[' => depth += 1,
                '}' | ']' if depth > 0 => depth -= 1,
                '}' if state == State::InExpansion => {
                    tokens.push(Token::Expansion(&input[start..i]));
                    state = State::Literal;
                    start = i + 1;
                }
                ']' if state == State::InInstruction => {
                    tokens.push(Token::Instruction(&input[start..i]));
                    state = State::Literal;
                    start = i + 1;
                }
                _ => {}
            },
        }
    }

    if state != State::Literal {
        start = open;
    }
    if start < input.len() {
        tokens.push(Token::Literal(&input[start..]));
    }
    tokens
}

fn parse_segments(input: &str, allow_instructions: bool) -> Result<(Vec<Segment>, Vec<Instruction>)> {
    let mut segments: Vec<Segment> = Vec::new();
    let mut instructions = Vec::new();

    for token in tokenize(input, allow_instructions) {
        match token {
            Token::Literal(text) => match segments.last_mut() {
                Some(Segment::Literal(prev)) => prev.push_str(text),
                _ => segments.push(Segment::Literal(text.to_string())),
            },
            Token::Expansion(body) => segments.push(Segment::Expansion(Expansion::parse(body)?)),
            Token::Instruction(body) => instructions.push(Instruction::parse(body)?),
        }
    }

    Ok((segments, instructions))
}
