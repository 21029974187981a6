use cp_bridge::EndpointRegistry;
use cp_core::config::Config;
use cp_core::types::CandidateId;

/// Print the handshake order and the order a send would try candidates in.
pub fn run(config: &Config, preferred: Option<&str>) {
    let registry = EndpointRegistry::from_config(&config.extension);
    let preferred = preferred.map(CandidateId::from);
    print!("{}", render(&registry, preferred.as_ref()));
}

fn render(registry: &EndpointRegistry, preferred: Option<&CandidateId>) -> String {
    let mut out = String::from("probe order:\n");
    for (i, id) in registry.candidates().iter().enumerate() {
        out.push_str(&format!("  {}. {id}\n", i + 1));
    }

    let Some(preferred) = preferred else {
        return out;
    };

    let note = if registry.candidates().contains(preferred) {
        ""
    } else {
        " (not in registry)"
    };
    out.push_str(&format!("delivery order with {preferred} cached{note}:\n"));
    for (i, id) in registry.delivery_order(Some(preferred)).iter().enumerate() {
        out.push_str(&format!("  {}. {id}\n", i + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EndpointRegistry {
        EndpointRegistry::new(Some("cfg"), ["a", "b"])
    }

    #[test]
    fn probe_order_only() {
        let text = render(&registry(), None);
        assert_eq!(text, "probe order:\n  1. cfg\n  2. a\n  3. b\n");
    }

    #[test]
    fn delivery_order_puts_preferred_first() {
        let text = render(&registry(), Some(&CandidateId::from("b")));
        assert!(text.contains("delivery order with b cached:\n  1. b\n  2. cfg\n  3. a\n"));
    }

    #[test]
    fn unknown_preferred_is_flagged() {
        let text = render(&registry(), Some(&CandidateId::from("zzz")));
        assert!(text.contains("(not in registry)"));
        assert!(text.contains("  1. zzz\n"));
    }
}
