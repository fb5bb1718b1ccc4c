//! Job path canonicalization.
//!
//! Jenkins addresses a nested job `team/app/main` as
//! `job/team/job/app/job/main` in URLs. Human paths are the CLI surface;
//! encoding happens once at the request boundary.

const JOB_SEGMENT: &str = "job";

/// Converts a human path like `team/app/main` into the Jenkins URL form
/// `job/team/job/app/job/main`. Segments are percent-encoded; an empty or
/// all-slash input yields the empty string, signalling the server root.
pub fn encode_job_path(human: &str) -> String {
    let trimmed = human.trim_matches('/');
    if trimmed.is_empty() {
        return String::new();
    }

    let mut out = String::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('/');
        }
        out.push_str(JOB_SEGMENT);
        out.push('/');
        out.push_str(&urlencoding::encode(segment));
    }
    out
}

/// Trims whitespace and surrounding slashes; the canonical spelling used
/// for cursor binding and output identifiers.
pub fn normalize_job_path(job_path: &str) -> String {
    job_path.trim().trim_matches('/').to_string()
}

pub fn join_job_path(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_string()
    } else {
        format!("{parent}/{child}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_job_path() {
        assert_eq!(encode_job_path(""), "");
        assert_eq!(encode_job_path("///"), "");
        assert_eq!(encode_job_path("simple"), "job/simple");
        assert_eq!(encode_job_path("team/app/main"), "job/team/job/app/job/main");
        assert_eq!(encode_job_path("/team/app/"), "job/team/job/app");
        assert_eq!(
            encode_job_path("folder name/job"),
            "job/folder%20name/job/job"
        );
        assert_eq!(encode_job_path("café/über"), "job/caf%C3%A9/job/%C3%BCber");
    }

    #[test]
    fn test_encode_alternates_job_segments() {
        let encoded = encode_job_path("a b/c d/e");
        let parts: Vec<&str> = encoded.split('/').collect();
        assert_eq!(parts.len() % 2, 0);
        for pair in parts.chunks(2) {
            assert_eq!(pair[0], "job");
            assert!(!pair[1].is_empty());
        }
    }

    #[test]
    fn test_encode_round_trips_segments() {
        let encoded = encode_job_path("a b/c d");
        let decoded: Vec<String> = encoded
            .split('/')
            .skip(1)
            .step_by(2)
            .map(|s| urlencoding::decode(s).unwrap().into_owned())
            .collect();
        assert_eq!(decoded, vec!["a b", "c d"]);
    }

    #[test]
    fn test_normalize_job_path() {
        assert_eq!(normalize_job_path("  /team/app/ "), "team/app");
        assert_eq!(normalize_job_path("team"), "team");
        assert_eq!(normalize_job_path(" / "), "");
    }

    #[test]
    fn test_join_job_path() {
        assert_eq!(join_job_path("", "ada"), "ada");
        assert_eq!(join_job_path("Tools", "ada"), "Tools/ada");
    }
}
