use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Operator keywords inside a CQN token list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "in")]
    In,
}

impl Operator {
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le
        )
    }
}

/// One element of a CQN expression (`where`, function arguments, order terms).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Token {
    Ref {
        #[serde(rename = "ref")]
        path: Vec<String>,
    },
    Val {
        val: Json,
    },
    Func {
        func: String,
        #[serde(default)]
        args: Vec<Token>,
    },
    Xpr {
        xpr: Vec<Token>,
    },
    List {
        list: Vec<Token>,
    },
    Op(Operator),
}

impl Token {
    pub fn reference<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Token::Ref {
            path: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Reference built from an OData path (`author/name`).
    pub fn path(path: &str) -> Self {
        Token::reference(path.split('/'))
    }

    pub fn val(v: impl Into<Json>) -> Self {
        Token::Val { val: v.into() }
    }

    pub fn func(name: impl Into<String>, args: Vec<Token>) -> Self {
        Token::Func {
            func: name.into(),
            args,
        }
    }

    pub fn xpr(tokens: Vec<Token>) -> Self {
        Token::Xpr { xpr: tokens }
    }

    pub fn list(items: Vec<Token>) -> Self {
        Token::List { list: items }
    }

    pub fn op(op: Operator) -> Self {
        Token::Op(op)
    }

    /// Segments of a `{ref}` token.
    pub fn ref_path(&self) -> Option<&[String]> {
        match self {
            Token::Ref { path } => Some(path),
            _ => None,
        }
    }
}

/// Join predicates with `and`. Multi-token predicates that contain `or`
/// are wrapped in `xpr` so precedence is kept.
pub fn conjunction(parts: Vec<Vec<Token>>) -> Vec<Token> {
    let mut out = Vec::new();
    for part in parts.into_iter().filter(|p| !p.is_empty()) {
        if !out.is_empty() {
            out.push(Token::Op(Operator::And));
        }
        if part.contains(&Token::Op(Operator::Or)) {
            out.push(Token::xpr(part));
        } else {
            out.extend(part);
        }
    }
    out
}
