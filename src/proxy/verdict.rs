//! Decides whether a candidate is a working proxy from the two fetch results

use crate::proxy::models::{Candidate, DeadReason, EdgeMetadata, LiveProxy, Verdict};

/// Compare the direct and proxied metadata documents for `candidate`.
///
/// A working proxy must change the client address the reference endpoint
/// sees and must come back with a country and an operator. Everything else
/// is dead.
pub fn judge(
    candidate: &Candidate,
    direct: Option<&EdgeMetadata>,
    proxied: Option<&EdgeMetadata>,
) -> Verdict {
    let Some(direct) = direct else {
        return Verdict::Dead(DeadReason::DirectUnavailable);
    };
    let Some(proxied) = proxied else {
        return Verdict::Dead(DeadReason::ProxyUnavailable);
    };

    if direct.client_ip == proxied.client_ip {
        return Verdict::Dead(DeadReason::NotSubstituted);
    }

    let country_code = proxied.country_code();
    let organization = proxied.organization();
    if country_code.is_empty() || organization.is_empty() {
        return Verdict::Dead(DeadReason::MissingAttribution);
    }

    Verdict::Live(LiveProxy {
        ip: candidate.ip,
        port: candidate.port,
        country_code: country_code.to_string(),
        organization: organization.to_string(),
    })
}
