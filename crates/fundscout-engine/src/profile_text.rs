//! Heuristic parsing of free-form profile text (a pasted resume or bio)
//! into structured profile fields.
//!
//! Section headers split the document; lines inside each section parse with
//! small per-section heuristics. Anything unrecognized stays in `raw_text`,
//! which the match engine consumes anyway, so a miss here degrades match
//! quality but never loses signal.

use fundscout_core::{EducationEntry, ExperienceEntry, Profile};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Skills,
    Experience,
    Education,
    ResearchInterests,
}

fn section_for(line: &str) -> Option<Section> {
    let header = line
        .trim()
        .trim_end_matches(':')
        .to_lowercase();
    // headers are short; a sentence mentioning "skills" is not a header
    if header.split_whitespace().count() > 4 {
        return None;
    }
    if header.contains("skill") || header.contains("technolog") || header.contains("competenc") {
        Some(Section::Skills)
    } else if header.contains("experience") || header.contains("employment") || header.contains("work history") {
        Some(Section::Experience)
    } else if header.contains("education") || header.contains("academic") {
        Some(Section::Education)
    } else if header.contains("research interest") || header.contains("interests") {
        Some(Section::ResearchInterests)
    } else {
        None
    }
}

/// Parse raw profile text into a version-1 profile. Never fails: an
/// unstructured blob yields a profile whose only content is `raw_text`.
pub fn parse_profile_text(raw_text: &str) -> Profile {
    let mut profile = Profile::new(raw_text);
    let mut section = Section::None;

    for line in raw_text.lines() {
        let trimmed = line.trim().trim_start_matches(['-', '*', '•']).trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(next) = section_for(line) {
            section = next;
            continue;
        }
        match section {
            Section::Skills => {
                for skill in trimmed.split([',', ';']) {
                    let skill = skill.trim();
                    if !skill.is_empty() {
                        profile.skills.insert(skill.to_lowercase());
                    }
                }
            }
            Section::Experience => {
                if let Some(entry) = parse_experience_line(trimmed) {
                    profile.experience.push(entry);
                }
            }
            Section::Education => {
                if let Some(entry) = parse_education_line(trimmed) {
                    profile.education.push(entry);
                }
            }
            Section::ResearchInterests => {
                for interest in trimmed.split([',', ';']) {
                    let interest = interest.trim();
                    if !interest.is_empty() {
                        profile.research_interests.insert(interest.to_lowercase());
                    }
                }
            }
            Section::None => {}
        }
    }
    profile
}

/// `Title at Organization (N years)` or `Title, Organization`.
fn parse_experience_line(line: &str) -> Option<ExperienceEntry> {
    let (body, years) = split_years(line);
    let (title, organization) = if let Some((title, org)) = body.split_once(" at ") {
        (title, org)
    } else if let Some((title, org)) = body.split_once(" @ ") {
        (title, org)
    } else if let Some((title, org)) = body.split_once(", ") {
        (title, org)
    } else {
        (body.as_str(), "")
    };
    let title = title.trim();
    if title.is_empty() {
        return None;
    }
    Some(ExperienceEntry {
        title: title.to_string(),
        organization: organization.trim().to_string(),
        years,
    })
}

/// Strip a trailing `(N years)` marker, returning the remainder and N.
fn split_years(line: &str) -> (String, Option<f64>) {
    if let Some(open) = line.rfind('(') {
        let inner = line[open + 1..].trim_end_matches(')').trim();
        if let Some(number) = inner.strip_suffix("years").or_else(|| inner.strip_suffix("year")) {
            if let Ok(years) = number.trim().parse::<f64>() {
                return (line[..open].trim().to_string(), Some(years));
            }
        }
    }
    (line.trim().to_string(), None)
}

/// `Degree, Institution` or `Degree - Institution`.
fn parse_education_line(line: &str) -> Option<EducationEntry> {
    let (degree, institution) = line
        .split_once(", ")
        .or_else(|| line.split_once(" - "))
        .unwrap_or((line, ""));
    let degree = degree.trim();
    if degree.is_empty() {
        return None;
    }
    Some(EducationEntry {
        degree: degree.to_string(),
        institution: institution.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESUME: &str = "\
Jane Doe
Quantum computing researcher.

Skills:
- Rust, Python, linear algebra
- superconducting qubits

Experience
- Research Scientist at QubitWorks (5 years)
- Postdoc, MIT

Education
- PhD in Physics, Caltech

Research Interests:
quantum error correction, quantum sensing
";

    #[test]
    fn sections_parse_into_structured_fields() {
        let profile = parse_profile_text(RESUME);

        assert!(profile.skills.contains("rust"));
        assert!(profile.skills.contains("superconducting qubits"));

        assert_eq!(profile.experience.len(), 2);
        assert_eq!(profile.experience[0].title, "Research Scientist");
        assert_eq!(profile.experience[0].organization, "QubitWorks");
        assert_eq!(profile.experience[0].years, Some(5.0));
        assert_eq!(profile.experience[1].organization, "MIT");

        assert_eq!(profile.education.len(), 1);
        assert_eq!(profile.education[0].institution, "Caltech");

        assert!(profile.research_interests.contains("quantum error correction"));
        assert_eq!(profile.version, 1);
        assert_eq!(profile.raw_text, RESUME);
    }

    #[test]
    fn unstructured_text_survives_as_raw_text_only() {
        let blob = "I enjoy building satellites and reading about climate policy.";
        let profile = parse_profile_text(blob);
        assert!(profile.skills.is_empty());
        assert!(profile.experience.is_empty());
        assert_eq!(profile.raw_text, blob);
        // matching still has something to work with
        assert!(profile.matching_text().contains("satellites"));
    }

    #[test]
    fn prose_mentioning_a_section_word_is_not_a_header() {
        let text = "Skills:\nRust\nMy experience shows that teamwork matters a lot here.\n";
        let profile = parse_profile_text(text);
        // the long sentence stays in the skills section as a skill line,
        // it does not open an experience section
        assert!(profile.experience.is_empty());
    }
}
