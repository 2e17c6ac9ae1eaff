//! Character-offset patching of in-memory content.

use thiserror::Error;

use super::delta::EditDelta;

/// A delta that does not fit the content it was applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("edit at {offset} (+{length}) outside content of {content_length} chars")]
pub struct OutOfRange {
    pub offset: usize,
    pub length: usize,
    pub content_length: usize,
}

/// Byte index of the `char_offset`-th character, or `content.len()` for the end.
pub fn byte_offset(content: &str, char_offset: usize) -> Option<usize> {
    if char_offset == 0 {
        return Some(0);
    }
    let mut chars = content.char_indices();
    match chars.nth(char_offset) {
        Some((byte, _)) => Some(byte),
        // Exactly one past the last character is the end of the content.
        None if content.chars().count() == char_offset => Some(content.len()),
        None => None,
    }
}

/// Apply one delta in place. On error `content` is left untouched.
pub fn apply_delta(content: &mut String, delta: &EditDelta) -> Result<(), OutOfRange> {
    let out_of_range = || OutOfRange {
        offset: delta.offset(),
        length: delta.len(),
        content_length: content.chars().count(),
    };

    match delta {
        EditDelta::Insert { offset, text } => {
            let at = byte_offset(content, *offset).ok_or_else(out_of_range)?;
            content.insert_str(at, text);
        }
        EditDelta::Remove {
            offset,
            removed_char_count,
        } => {
            let end_char = offset
                .checked_add(*removed_char_count)
                .ok_or_else(out_of_range)?;
            let start = byte_offset(content, *offset).ok_or_else(out_of_range)?;
            let end = byte_offset(content, end_char).ok_or_else(out_of_range)?;
            content.replace_range(start..end, "");
        }
    }
    Ok(())
}

/// Fold a delta sequence over `initial`, stopping at the first bad delta.
pub fn apply_all<'a>(
    initial: &str,
    deltas: impl IntoIterator<Item = &'a EditDelta>,
) -> Result<String, OutOfRange> {
    let mut content = initial.to_string();
    for delta in deltas {
        apply_delta(&mut content, delta)?;
    }
    Ok(content)
}
