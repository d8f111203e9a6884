use std::mem::take;

/// Sorts the comments between two tokens into trailing, detached and leading comments.
///
/// Consecutive line comments are merged into a single block. A block is flushed when a blank
/// line is seen, or when a different kind of comment starts. The first flushed block becomes the
/// trailing comment of the previous token if it may still attach there; any other flushed block
/// is detached. Whatever is left unflushed when the next token is reached is its leading comment.
#[derive(Debug)]
pub(super) struct Comments {
    buffer: Option<String>,
    is_line_comment: bool,
    can_attach_to_prev: bool,
    trailing: Option<String>,
    detached: Vec<String>,
}

impl Comments {
    pub fn new(can_attach_to_prev: bool) -> Self {
        Comments {
            buffer: None,
            is_line_comment: false,
            can_attach_to_prev,
            trailing: None,
            detached: Vec::new(),
        }
    }

    pub fn line_comment(&mut self, text: &str) {
        if self.buffer.is_some() && !self.is_line_comment {
            self.flush();
        }
        self.buffer.get_or_insert_with(String::new).push_str(text);
        self.is_line_comment = true;
    }

    pub fn block_comment(&mut self, text: &str) {
        if self.buffer.is_some() {
            self.flush();
        }
        self.buffer = Some(text.to_owned());
        self.is_line_comment = false;
    }

    pub fn flush(&mut self) {
        if let Some(comment) = self.buffer.take() {
            if self.can_attach_to_prev {
                self.trailing = Some(comment);
                self.can_attach_to_prev = false;
            } else {
                self.detached.push(comment);
            }
        }
    }

    pub fn clear(&mut self) {
        self.buffer = None;
    }

    pub fn detach_from_prev(&mut self) {
        self.can_attach_to_prev = false;
    }

    /// Returns the trailing comment for the previous token, and the detached and leading
    /// comments for the next one.
    pub fn finish(mut self) -> (Option<String>, crate::ast::Comments) {
        let leading = self.buffer.take();
        (
            self.trailing,
            crate::ast::Comments {
                leading_detached_comments: take(&mut self.detached),
                leading_comment: leading,
                trailing_comment: None,
            },
        )
    }
}
