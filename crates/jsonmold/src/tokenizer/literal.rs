use super::TokenKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Literal {
    Null,
    True,
    False,
}

/// Outcome of matching a literal against the bytes at the window position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Every byte present matched, but the window ends before the literal does.
    NeedMore,
    /// The whole literal matched; carries its length.
    Done(usize),
    /// The byte at this index does not belong to the literal.
    Reject(usize),
}

impl Literal {
    pub(crate) fn text(self) -> &'static str {
        match self {
            Literal::Null => "null",
            Literal::True => "true",
            Literal::False => "false",
        }
    }

    pub(crate) fn kind(self) -> TokenKind {
        match self {
            Literal::Null => TokenKind::Null,
            Literal::True => TokenKind::True,
            Literal::False => TokenKind::False,
        }
    }

    /// `bytes` starts at the literal's first byte.
    pub(crate) fn step(self, bytes: &[u8]) -> Step {
        let expected = self.text().as_bytes();
        for (index, &want) in expected.iter().enumerate() {
            match bytes.get(index) {
                None => return Step::NeedMore,
                Some(&got) if got != want => return Step::Reject(index),
                Some(_) => {}
            }
        }
        Step::Done(expected.len())
    }
}
