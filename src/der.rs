//! Just enough DER to unwrap certificate extension payloads.

const TAG_OCTET_STRING: u8 = 0x04;
const CONSTRUCTED: u8 = 0x20;

/// Split one TLV off the front of `input`: `(tag, content, rest)`.
pub(crate) fn read_tlv(input: &[u8]) -> Option<(u8, &[u8], &[u8])> {
    let (&tag, rest) = input.split_first()?;
    // High-tag-number form is never used by the structures we read.
    if tag & 0x1F == 0x1F {
        return None;
    }
    let (&first, rest) = rest.split_first()?;
    let (len, rest) = if first & 0x80 == 0 {
        (first as usize, rest)
    } else {
        let n = (first & 0x7F) as usize;
        if n == 0 || n > 4 || rest.len() < n {
            return None;
        }
        let len = rest[..n].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize);
        (len, &rest[n..])
    };
    if rest.len() < len {
        return None;
    }
    let (content, rest) = rest.split_at(len);
    Some((tag, content, rest))
}

/// Descend through constructed wrappers (SEQUENCE, context tags) to the first
/// OCTET STRING and return its content. The outermost element must span the
/// whole input.
pub(crate) fn unwrap_octet_string(der: &[u8]) -> Option<&[u8]> {
    let (tag, content, rest) = read_tlv(der)?;
    if !rest.is_empty() {
        return None;
    }
    descend(tag, content)
}

fn descend(tag: u8, content: &[u8]) -> Option<&[u8]> {
    if tag == TAG_OCTET_STRING {
        return Some(content);
    }
    if tag & CONSTRUCTED == 0 {
        return None;
    }
    let (inner_tag, inner, _) = read_tlv(content)?;
    descend(inner_tag, inner)
}
