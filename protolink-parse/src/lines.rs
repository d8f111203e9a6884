use crate::{index_to_i32, Span};

/// Maps byte offsets to zero-based line and column numbers, and back.
#[derive(Debug, Clone)]
pub(crate) struct LineResolver {
    // Byte offset of the start of each line after the first.
    lines: Vec<i32>,
}

impl LineResolver {
    pub fn new(source: &str) -> Self {
        let lines = source
            .match_indices('\n')
            .map(|(index, _)| index_to_i32(index + 1))
            .collect();
        LineResolver { lines }
    }

    pub fn resolve(&self, offset: usize) -> (i32, i32) {
        match self.lines.binary_search(&index_to_i32(offset)) {
            Ok(index) => (index_to_i32(index + 1), 0),
            Err(0) => (0, index_to_i32(offset)),
            Err(index) => (
                index_to_i32(index),
                index_to_i32(offset) - self.lines[index - 1],
            ),
        }
    }

    /// Converts a source code info span (`[line, col, end_col]` or
    /// `[line, col, end_line, end_col]`) back into a byte range.
    pub fn offsets(&self, span: &[i32]) -> Option<Span> {
        let (start_line, start_col, end_line, end_col) = match *span {
            [line, start_col, end_col] => (line, start_col, line, end_col),
            [start_line, start_col, end_line, end_col] => (start_line, start_col, end_line, end_col),
            _ => return None,
        };

        let start = self.line_start(start_line)? + usize::try_from(start_col).ok()?;
        let end = self.line_start(end_line)? + usize::try_from(end_col).ok()?;
        Some(start..end)
    }

    fn line_start(&self, line: i32) -> Option<usize> {
        match line {
            0 => Some(0),
            line if line > 0 => self
                .lines
                .get(usize::try_from(line - 1).ok()?)
                .and_then(|&offset| usize::try_from(offset).ok()),
            _ => None,
        }
    }

    pub fn resolve_span(&self, span: Span) -> Vec<i32> {
        let (start_line, start_col) = self.resolve(span.start);
        let (end_line, end_col) = self.resolve(span.end);

        if start_line == end_line {
            vec![start_line, start_col, end_col]
        } else {
            vec![start_line, start_col, end_line, end_col]
        }
    }
}

/// Converts a source code info span back into a byte range within `source`.
///
/// Returns `None` if the span is malformed or does not lie within the source.
pub fn span_to_offsets(source: &str, span: &[i32]) -> Option<Span> {
    let range = LineResolver::new(source).offsets(span)?;
    if range.end <= source.len() {
        Some(range)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_line_number() {
        let resolver = LineResolver::new("hello\nworld\nfoo");

        assert_eq!(resolver.resolve(0), (0, 0));
        assert_eq!(resolver.resolve(5), (0, 5));
        assert_eq!(resolver.resolve(6), (1, 0));
        assert_eq!(resolver.resolve(10), (1, 4));
        assert_eq!(resolver.resolve(12), (2, 0));
        assert_eq!(resolver.resolve(14), (2, 2));
    }

    #[test]
    fn offsets_invert_resolve() {
        let source = "hello\nworld\nfoo";
        let resolver = LineResolver::new(source);

        for span in [0..5, 6..11, 2..13, 12..15] {
            let resolved = resolver.resolve_span(span.clone());
            assert_eq!(resolver.offsets(&resolved), Some(span));
        }

        assert_eq!(resolver.offsets(&[7, 0, 1]), None);
        assert_eq!(resolver.offsets(&[0, 1]), None);
        assert_eq!(span_to_offsets(source, &[2, 0, 40]), None);
    }
}
