use crate::error::{MvxError, Result};

/// Chain operators. `;` is not among them: it separates chains and never
/// short-circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    And,
    Or,
    Pipe,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Maximal run of non-operator text. Not a shell word: whitespace stays
    /// inside, quoting only shields operators.
    Slab(String),
    Op(Operator),
    Semi,
    LParen,
    RParen,
}

/// One command chain: `commands.len() == operators.len() + 1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSpec {
    pub slabs: Vec<String>,
    pub operators: Vec<Operator>,
}

/// Single-pass, quote-aware tokeniser. Quotes are preserved literally in the
/// token; an unterminated quote is a parse error.
pub fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut i = 0;

    fn flush(tokens: &mut Vec<Token>, current: &mut String) {
        if !current.is_empty() {
            tokens.push(Token::Slab(std::mem::take(current)));
        }
    }

    while i < chars.len() {
        let c = chars[i];

        if let Some(q) = quote {
            current.push(c);
            if c == q {
                quote = None;
            }
            i += 1;
            continue;
        }

        match c {
            '\'' | '"' => {
                quote = Some(c);
                current.push(c);
                i += 1;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::Op(Operator::And));
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::Op(Operator::Or));
                i += 2;
            }
            '|' => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::Op(Operator::Pipe));
                i += 1;
            }
            ';' => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::Semi);
                i += 1;
            }
            '(' => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                flush(&mut tokens, &mut current);
                tokens.push(Token::RParen);
                i += 1;
            }
            _ => {
                current.push(c);
                i += 1;
            }
        }
    }

    if quote.is_some() {
        return Err(MvxError::Parse("unterminated quote".to_string()));
    }

    flush(&mut tokens, &mut current);
    Ok(tokens)
}

/// Fold a token stream into command chains, split on `;`. Parentheses are
/// currently whitespace: they vanish and their neighbours merge.
pub fn parse(input: &str) -> Result<Vec<ChainSpec>> {
    let mut merged: Vec<Token> = Vec::new();
    for token in tokenize(input)? {
        match token {
            Token::LParen | Token::RParen => continue,
            Token::Slab(text) => {
                if let Some(Token::Slab(prev)) = merged.last_mut() {
                    prev.push(' ');
                    prev.push_str(&text);
                } else {
                    merged.push(Token::Slab(text));
                }
            }
            other => merged.push(other),
        }
    }

    let mut chains = Vec::new();
    let mut slabs: Vec<String> = Vec::new();
    let mut operators: Vec<Operator> = Vec::new();
    let mut pending: Option<String> = None;

    let mut finish_chain = |slabs: &mut Vec<String>,
                            operators: &mut Vec<Operator>,
                            pending: &mut Option<String>|
     -> Result<()> {
        match pending.take() {
            Some(slab) => slabs.push(slab),
            None if !operators.is_empty() => {
                return Err(MvxError::Parse(
                    "missing command after operator".to_string(),
                ));
            }
            None => {}
        }
        if !slabs.is_empty() {
            chains.push(ChainSpec {
                slabs: std::mem::take(slabs),
                operators: std::mem::take(operators),
            });
        }
        Ok(())
    };

    for token in merged {
        match token {
            Token::Slab(text) => {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    pending = Some(trimmed.to_string());
                }
            }
            Token::Op(op) => {
                let slab = pending.take().ok_or_else(|| {
                    MvxError::Parse("missing command before operator".to_string())
                })?;
                slabs.push(slab);
                operators.push(op);
            }
            Token::Semi => finish_chain(&mut slabs, &mut operators, &mut pending)?,
            Token::LParen | Token::RParen => unreachable!("parens removed above"),
        }
    }
    finish_chain(&mut slabs, &mut operators, &mut pending)?;

    Ok(chains)
}
