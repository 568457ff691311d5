//! ホストページの契約に必要なCSSセレクタのサブセット
//!
//! 対応: 型セレクタ、`*`、`#id`、`.class`、複合セレクタ、
//! 子孫結合子（空白）、子結合子（`>`）

use super::NodeId;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,
    #[error("Unsupported character '{ch}' in selector '{selector}'")]
    Unsupported { ch: char, selector: String },
    #[error("Dangling combinator in selector '{0}'")]
    DanglingCombinator(String),
}

/// 単一要素に対する条件（`tag#id.class1.class2`）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// セレクタマッチングに必要なツリーの読み取りビュー
pub trait SelectorTree {
    /// 要素ノードでなければ`None`
    fn element_tag(&self, node: NodeId) -> Option<&str>;
    fn element_id(&self, node: NodeId) -> Option<&str>;
    fn element_has_class(&self, node: NodeId, class: &str) -> bool;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
}

/// パース済みのセレクタ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    /// 左から右の順。先頭要素の結合子は使われない
    parts: Vec<(Combinator, Compound)>,
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

impl Compound {
    /// `div#id.class`形式の複合セレクタをパース
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        if text.is_empty() {
            return Err(SelectorError::Empty);
        }

        let mut compound = Compound::default();
        let mut chars = text.chars().peekable();

        let mut tag = String::new();
        if chars.peek() == Some(&'*') {
            chars.next();
            tag.push('*');
        } else {
            while let Some(&ch) = chars.peek() {
                if !is_ident_char(ch) {
                    break;
                }
                tag.push(ch);
                chars.next();
            }
        }
        if !tag.is_empty() && tag != "*" {
            compound.tag = Some(tag.to_ascii_lowercase());
        }

        while let Some(prefix) = chars.next() {
            if prefix != '#' && prefix != '.' {
                return Err(SelectorError::Unsupported {
                    ch: prefix,
                    selector: text.to_string(),
                });
            }

            let mut name = String::new();
            while let Some(&ch) = chars.peek() {
                if !is_ident_char(ch) {
                    break;
                }
                name.push(ch);
                chars.next();
            }
            if name.is_empty() {
                return Err(SelectorError::Unsupported {
                    ch: prefix,
                    selector: text.to_string(),
                });
            }

            if prefix == '#' {
                compound.id = Some(name);
            } else {
                compound.classes.push(name);
            }
        }

        Ok(compound)
    }

    fn matches<T: SelectorTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        let Some(tag) = tree.element_tag(node) else {
            return false;
        };
        if let Some(expected) = &self.tag {
            if !tag.eq_ignore_ascii_case(expected) {
                return false;
            }
        }
        if let Some(expected) = &self.id {
            if tree.element_id(node) != Some(expected.as_str()) {
                return false;
            }
        }
        self.classes
            .iter()
            .all(|class| tree.element_has_class(node, class))
    }
}

fn push_compound(
    current: &mut String,
    parts: &mut Vec<(Combinator, Compound)>,
    combinator: Combinator,
) -> Result<(), SelectorError> {
    if !current.is_empty() {
        parts.push((combinator, Compound::parse(current)?));
        current.clear();
    }
    Ok(())
}

impl Selector {
    pub fn parse(text: &str) -> Result<Self, SelectorError> {
        let mut parts = Vec::new();
        let mut pending = Combinator::Descendant;
        let mut explicit_child = false;
        let mut current = String::new();

        for ch in text.chars() {
            if ch.is_whitespace() || ch == '>' {
                if !current.is_empty() {
                    push_compound(&mut current, &mut parts, pending)?;
                    pending = Combinator::Descendant;
                    explicit_child = false;
                }
                if ch == '>' {
                    if parts.is_empty() || explicit_child {
                        return Err(SelectorError::DanglingCombinator(text.to_string()));
                    }
                    pending = Combinator::Child;
                    explicit_child = true;
                }
            } else {
                current.push(ch);
            }
        }

        if current.is_empty() {
            if explicit_child {
                return Err(SelectorError::DanglingCombinator(text.to_string()));
            }
        } else {
            push_compound(&mut current, &mut parts, pending)?;
        }

        if parts.is_empty() {
            return Err(SelectorError::Empty);
        }

        Ok(Self { parts })
    }

    /// `node`がこのセレクタに一致するか
    pub fn matches<T: SelectorTree + ?Sized>(&self, tree: &T, node: NodeId) -> bool {
        self.matches_at(tree, self.parts.len() - 1, node)
    }

    fn matches_at<T: SelectorTree + ?Sized>(&self, tree: &T, index: usize, node: NodeId) -> bool {
        let (combinator, compound) = &self.parts[index];
        if !compound.matches(tree, node) {
            return false;
        }
        if index == 0 {
            return true;
        }

        match combinator {
            Combinator::Child => tree
                .parent_of(node)
                .is_some_and(|parent| self.matches_at(tree, index - 1, parent)),
            Combinator::Descendant => {
                let mut ancestor = tree.parent_of(node);
                while let Some(current) = ancestor {
                    if self.matches_at(tree, index - 1, current) {
                        return true;
                    }
                    ancestor = tree.parent_of(current);
                }
                false
            }
        }
    }
}

impl std::str::FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
