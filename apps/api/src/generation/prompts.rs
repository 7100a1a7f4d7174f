// Prompt constants and builders for the résumé workflow.
// The sentinel tags here must match the ones the extractor looks for.

use crate::generation::extractor::{ANALYSIS_TAGS, GENERATE_TAGS};
use crate::models::UserProfile;

/// System prompt for the job-description analysis stage.
pub const ANALYSIS_SYSTEM: &str = "You are an expert technical recruiter. \
    You read job descriptions and distil what a hiring manager will screen for. \
    Be concise and factual. Do NOT invent requirements that are not in the text.";

/// System prompt for résumé generation.
pub const GENERATION_SYSTEM: &str = "You are an expert resume writer who tailors LaTeX resumes \
    to a specific job. You only use facts present in the candidate profile. \
    You never invent employers, titles, dates, degrees or metrics.";

/// Hard rules shared by every generation prompt.
const GENERATION_RULES: &str = "\
RULES:
1. Fill the LaTeX TEMPLATE with content from the CANDIDATE PROFILE only. Keep its preamble, \
macros and overall structure.
2. Reorder and rephrase skills and bullet points so the most relevant ones for this job come first. \
Bullets with a higher weight matter more to the candidate.
3. Mirror the job's terminology where the profile genuinely supports it. Never keyword-stuff.
4. Drop content that is irrelevant to the job rather than padding the page.
5. Escape LaTeX special characters (&, %, $, #, _) in inserted text.
6. The result must be a complete, compilable LaTeX document from \\documentclass to \\end{document}.";

/// Everything needed to build one generation prompt.
pub struct PromptInputs<'a> {
    pub job_description: &'a str,
    pub profile: &'a UserProfile,
    pub template: &'a str,
    pub analysis: Option<&'a str>,
}

/// Limits applied when the full request is too large to send.
#[derive(Debug, Clone, Copy)]
pub struct TrimLimits {
    pub job_chars: usize,
    pub experience_entries: usize,
}

pub fn build_analysis_prompt(job_description: &str) -> String {
    format!(
        "Analyze the following job description.

List, as short bullet points:
- the hard requirements (skills, years of experience, degrees, certifications),
- the nice-to-have signals,
- the most important keywords and technologies,
- the seniority and tone of the role.

Wrap your ENTIRE answer in {open} and {close} tags.

JOB DESCRIPTION:
{job_description}",
        open = ANALYSIS_TAGS.open,
        close = ANALYSIS_TAGS.close,
    )
}

pub fn build_generation_prompt(inputs: &PromptInputs<'_>) -> String {
    let profile_json = serde_json::to_string_pretty(inputs.profile)
        .unwrap_or_else(|_| "{}".to_string());

    let analysis_section = match inputs.analysis {
        Some(analysis) => format!("JOB ANALYSIS:\n{analysis}\n\n"),
        None => String::new(),
    };

    format!(
        "Tailor the candidate's resume to the job below.

JOB DESCRIPTION:
{job}

{analysis_section}CANDIDATE PROFILE (JSON, source of truth):
{profile_json}

TEMPLATE (LaTeX):
{template}

{rules}

OUTPUT FORMAT:
Wrap the ENTIRE LaTeX document in {open} and {close} tags. \
Output nothing outside the tags: no explanations, no markdown code fences.",
        job = inputs.job_description,
        template = inputs.template,
        rules = GENERATION_RULES,
        open = GENERATE_TAGS.open,
        close = GENERATE_TAGS.close,
    )
}

/// Same prompt with the job description cut to a prefix and the experience list shortened.
/// The template is never cut.
pub fn build_trimmed_generation_prompt(inputs: &PromptInputs<'_>, limits: TrimLimits) -> String {
    let job_description = truncate_chars(inputs.job_description, limits.job_chars);
    let profile = inputs.profile.with_experience_limit(limits.experience_entries);

    build_generation_prompt(&PromptInputs {
        job_description: &job_description,
        profile: &profile,
        template: inputs.template,
        analysis: inputs.analysis,
    })
}

pub fn build_trimmed_analysis_prompt(job_description: &str, limits: TrimLimits) -> String {
    build_analysis_prompt(&truncate_chars(job_description, limits.job_chars))
}

/// First `max_chars` characters of `text` (char-boundary safe).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::profile::{Bullet, ExperienceEntry};

    fn profile_with(companies: &[&str]) -> UserProfile {
        UserProfile {
            skills: vec!["Rust".to_string(), "Postgres".to_string()],
            experience: companies
                .iter()
                .map(|company| ExperienceEntry {
                    company: company.to_string(),
                    title: "Engineer".to_string(),
                    date: "2022".to_string(),
                    description: vec![Bullet::Plain("Built the thing".to_string())],
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_generation_prompt_embeds_all_inputs_and_sentinels() {
        let profile = profile_with(&["Initech"]);
        let prompt = build_generation_prompt(&PromptInputs {
            job_description: "Senior Rust engineer wanted",
            profile: &profile,
            template: "\\documentclass{article}",
            analysis: None,
        });

        assert!(prompt.contains("Senior Rust engineer wanted"));
        assert!(prompt.contains("\"Initech\""));
        assert!(prompt.contains("\\documentclass{article}"));
        assert!(prompt.contains("<GENERATE>"));
        assert!(prompt.contains("</GENERATE>"));
        assert!(!prompt.contains("JOB ANALYSIS"));
    }

    #[test]
    fn test_generation_prompt_includes_analysis_when_present() {
        let profile = profile_with(&[]);
        let prompt = build_generation_prompt(&PromptInputs {
            job_description: "jd",
            profile: &profile,
            template: "tpl",
            analysis: Some("- 5+ years Rust"),
        });
        assert!(prompt.contains("JOB ANALYSIS:\n- 5+ years Rust"));
    }

    #[test]
    fn test_placeholder_like_text_in_inputs_is_left_alone() {
        let profile = profile_with(&[]);
        let prompt = build_generation_prompt(&PromptInputs {
            job_description: "literal {template} in the posting",
            profile: &profile,
            template: "\\newcommand{\\job}{x}",
            analysis: None,
        });
        assert!(prompt.contains("literal {template} in the posting"));
    }

    #[test]
    fn test_trimmed_prompt_cuts_job_and_experience() {
        let profile = profile_with(&["Alpha", "Beta", "Gamma", "Delta"]);
        let job = "x".repeat(5_000);
        let prompt = build_trimmed_generation_prompt(
            &PromptInputs {
                job_description: &job,
                profile: &profile,
                template: "tpl",
                analysis: None,
            },
            TrimLimits {
                job_chars: 1000,
                experience_entries: 2,
            },
        );

        assert!(prompt.contains(&"x".repeat(1000)));
        assert!(!prompt.contains(&"x".repeat(1001)));
        assert!(prompt.contains("Alpha") && prompt.contains("Beta"));
        assert!(!prompt.contains("Gamma") && !prompt.contains("Delta"));
    }

    #[test]
    fn test_analysis_prompt_uses_analysis_tags() {
        let prompt = build_analysis_prompt("We need SQL");
        assert!(prompt.contains("<ANALYSIS>"));
        assert!(prompt.contains("We need SQL"));
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
    }
}
