use cp_core::config::ExtensionConfig;
use cp_core::types::CandidateId;

/// Ordered, deduplicated list of candidate extension ids.
///
/// The configured id (if any) comes first, then the built-in fallbacks in
/// declaration order. Blank entries are dropped and the first occurrence
/// of a duplicate wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRegistry {
    candidates: Vec<CandidateId>,
}

impl EndpointRegistry {
    pub fn new<I, S>(configured: Option<&str>, fallbacks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut candidates: Vec<CandidateId> = Vec::new();
        let configured = configured.map(|s| s.to_string());
        let all = configured
            .into_iter()
            .chain(fallbacks.into_iter().map(|s| s.as_ref().to_string()));

        for raw in all {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            let id = CandidateId::from(trimmed);
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }

        Self { candidates }
    }

    pub fn from_config(config: &ExtensionConfig) -> Self {
        Self::new(config.extension_id.as_deref(), &config.fallback_ids)
    }

    pub fn candidates(&self) -> &[CandidateId] {
        &self.candidates
    }

    pub fn primary(&self) -> Option<&CandidateId> {
        self.candidates.first()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidates in the order a send should try them: `preferred` first,
    /// then everything else in registry order.
    ///
    /// A preferred id that is not in the registry is still tried first.
    pub fn delivery_order(&self, preferred: Option<&CandidateId>) -> Vec<CandidateId> {
        let mut order = Vec::with_capacity(self.candidates.len() + 1);
        if let Some(preferred) = preferred {
            order.push(preferred.clone());
        }
        order.extend(
            self.candidates
                .iter()
                .filter(|id| Some(*id) != preferred)
                .cloned(),
        );
        order
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
