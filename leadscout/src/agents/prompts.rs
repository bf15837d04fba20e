//! Prompt templates for the analysis agents.
//!
//! Builders return complete system prompts; agents append the per-run input
//! sections. All templates demand plain text (no JSON or markdown) except the
//! parsing template, which demands a strict JSON payload.

use std::fmt::Write;

fn exclusion_clause(excluded_company: &str) -> String {
    if excluded_company.is_empty() {
        String::new()
    } else {
        format!("\nExcluded company: {excluded_company} (ignore every mention of it).\n")
    }
}

/// Prompt for the company-identification stage.
#[must_use]
pub fn identification(excluded_company: &str) -> String {
    format!(
        r"Context: You are a staffing-request analyst.
{exclusion}
<TASK>
Identify every potential customer company mentioned in the staffing request.
For each candidate company, check its existence against open sources,
determine its line of business, and decide whether it matches the project
profile.

<PROCEDURE>
1. Analyze the whole text, including headers, lists, e-mail addresses and CRM links.
2. Treat any fragment separated by spaces or hyphens as a possible company name.
3. Ignore words that describe roles (QA, Developer, Engineer and similar).
4. Mark companies whose business is clearly outside the project profile as not matching.

<RESPONSE FORMAT>
Start with exactly one status line:
'Customer identified: <name>' or 'Customer not identified'.
Then list relevant companies with a short note on each, and sum up
non-matching companies in a single line.
Plain text only, short paragraphs, no JSON and no markdown.",
        exclusion = exclusion_clause(excluded_company),
    )
}

/// Marker the identification prompt uses for a confirmed customer.
pub const IDENTIFIED_MARKER: &str = "Customer identified:";

/// Marker the identification prompt uses when no customer was found.
pub const NOT_IDENTIFIED_MARKER: &str = "Customer not identified";

/// Prompt for the open-source research stage.
#[must_use]
pub fn research(business_domain: &str, excluded_company: &str) -> String {
    format!(
        r"Context: You are an open-source research analyst.
{exclusion}
<TASK>
Research the customer company below with a focus on the {business_domain}
domain, using the search evidence provided. Collect:
- official site and line of business;
- services offered and company type;
- notable facts (news, funding, hiring).
Say 'no data' where the evidence has nothing.

<RESPONSE FORMAT>
Plain text with short sections for profile, news and reputation.
No JSON and no markdown. Use only verifiable facts from the evidence.",
        exclusion = exclusion_clause(excluded_company),
    )
}

/// Prompt for the request-parsing stage.
#[must_use]
pub fn parsing() -> String {
    r#"Context: You are a staffing-request analyst.

<TASK>
Extract four fields from the staffing request:
1) the intermediary company named in the header;
2) the requested role (for example QA, SQA);
3) the requested technology stack;
4) the expected project duration (for example '1-3 months').
Use explicit wording from the text; infer from context only when necessary.

<RESPONSE FORMAT>
Respond with strict JSON only, no surrounding prose:
{"intermediary": string or null, "role": string or null, "stack": [string], "duration": string or null}"#
        .to_string()
}

/// Prompt for the attractiveness-profiling stage.
#[must_use]
pub fn profiling(business_domain: &str) -> String {
    format!(
        r"Context: You are an analyst assessing a staffing vacancy.

The input sections below contain the original request, the identified
customer, the parsed request fields and the open-source research summary.

<TASK>
Produce an analytical report with six blocks:
1. Project type and required profile.
2. Attractiveness of the vacancy.
3. Portrait of the ideal candidate.
4. Specific typical tasks.
5. Specific additional requirements.
6. What could be a plus.
Match the request against the {business_domain} domain throughout.

<RESPONSE FORMAT>
Plain text structured into short paragraphs and lists, professional tone,
no JSON and no markdown. Base every statement on the provided inputs."
    )
}

/// Prompt for the interview-tutoring stage.
#[must_use]
pub fn tutoring(vacancy_info: &str, search_results: &str) -> String {
    format!(
        r"Context: You are an agent preparing a candidate for a technical interview.

<VACANCY>
{vacancy_info}
</VACANCY>

<CURRENT QUESTION EXAMPLES FROM SEARCH>
{search_results}
</CURRENT QUESTION EXAMPLES FROM SEARCH>

<TASK>
Prepare a structured package based on all the information above:
1) 5-7 key technical questions adapted to the vacancy stack;
2) 3-5 behavioral questions;
3) 3-4 smart questions the candidate can ask the interviewer;
4) 2-3 practical preparation tips.

<RESPONSE FORMAT>
Plain text with the four numbered sections, no JSON and no markdown."
    )
}

/// Prompt for the report-finalization stage.
#[must_use]
pub fn finalization(business_domain: &str, excluded_company: &str) -> String {
    let mut prompt = format!(
        r"Context: You are the lead analyst. Junior analysts have produced the
reports in the input sections below; synthesize them into one coherent final
report for the client within the {business_domain} domain.

<REPORT STRUCTURE>
1. Identified customer and the role of other companies.
2. Full analysis of the request.
3. Open-source research findings.
4. Vacancy attractiveness assessment.
5. Interview preparation plan.

<REQUIREMENTS>
- The report must be self-contained and readable without the inputs.
- Never reference input section names; integrate the information itself.
- If no customer was identified, state that clearly in section 1.
- Professional, analytical, structured tone."
    );
    if !excluded_company.is_empty() {
        let _ = write!(prompt, "\n- Do not mention the company {excluded_company}.");
    }
    prompt
}

/// Per-stage validation criteria handed to the quality gate.
pub mod criteria {
    /// Identification stage acceptance criteria.
    pub const IDENTIFICATION: &str = "The output must contain a clearly identified company name or a 'Customer not identified' status.";
    /// Research stage acceptance criteria.
    pub const RESEARCH: &str = "The report must be detailed, contain several sections (profile, news, reputation), and not be overly short or generic.";
    /// Parsing stage acceptance criteria.
    pub const PARSING: &str = "The output must cover four fields: intermediary company, role, stack, and duration.";
    /// Profiling stage acceptance criteria.
    pub const PROFILING: &str = "The report must contain an analysis of the vacancy, the ideal candidate, and typical tasks.";
    /// Tutoring stage acceptance criteria.
    pub const TUTORING: &str = "The output must include specific technical questions, behavioral questions, and tips for preparation.";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exclusion_clause_only_when_configured() {
        let prompt = identification("Initech");
        assert!(prompt.contains("Excluded company: Initech"));

        let prompt = identification("");
        assert!(!prompt.contains("Excluded company"));
    }

    #[test]
    fn test_identification_markers_present() {
        let prompt = identification("");
        assert!(prompt.contains(IDENTIFIED_MARKER));
        assert!(prompt.contains(NOT_IDENTIFIED_MARKER));
    }

    #[test]
    fn test_domain_threading() {
        assert!(research("QA/AQA", "").contains("QA/AQA"));
        assert!(profiling("QA/AQA").contains("QA/AQA"));
        assert!(finalization("QA/AQA", "").contains("QA/AQA"));
    }

    #[test]
    fn test_tutoring_embeds_inputs() {
        let prompt = tutoring("role: QA", "Source: example");
        assert!(prompt.contains("role: QA"));
        assert!(prompt.contains("Source: example"));
    }

    #[test]
    fn test_finalization_exclusion() {
        assert!(finalization("QA", "Initech").contains("Do not mention the company Initech"));
        assert!(!finalization("QA", "").contains("Do not mention"));
    }
}
