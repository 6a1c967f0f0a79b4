pub mod logger;

/// The last `max_bytes` of `s`, cut forward to a char boundary
pub fn tail(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut start = s.len() - max_bytes;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tail() {
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
        // 'é' is two bytes; never split it
        assert_eq!(tail("aé", 1), "");
        assert_eq!(tail("aéb", 3), "éb");
    }
}
