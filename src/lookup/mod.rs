pub mod rdns;

pub use rdns::*;

/// Sanitize a string for safe terminal display by removing control characters.
///
/// PTR records are attacker-controlled; this keeps escape sequences out of
/// hop host names.
pub(crate) fn sanitize_display(s: &str) -> String {
    s.chars().filter(|c| !c.is_control()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_display() {
        assert_eq!(sanitize_display("router.example.net"), "router.example.net");
        assert_eq!(sanitize_display("evil\x1b[31m.example"), "evil[31m.example");
        assert_eq!(sanitize_display("tab\there\n"), "tabhere");
    }
}
