// Contract analysis LLM prompt templates.
// All prompts for the contracts module are defined here.

use crate::models::contract::ContractType;

pub const ANALYSIS_SYSTEM: &str = "\
You are a meticulous contract risk reviewer. \
You read a single contract and report the clauses that put the signing party at risk. \
Severity must be exactly one of \"low\", \"medium\", \"high\". \
Report only risks that are present in the text; an empty list is a valid answer.";

pub const ANALYSIS_PROMPT: &str = r#"Review the following {contract_type} contract.

FOCUS AREAS FOR THIS CONTRACT TYPE:
{focus_areas}

CONTRACT TEXT:
{contract_text}

OUTPUT SCHEMA (return exactly this structure):
{
  "summary": "string (2-3 sentences, plain language)",
  "risks": [
    {
      "clauseReference": "string (section number or short quote)",
      "severity": "low" | "medium" | "high",
      "description": "string (why this clause is risky)"
    }
  ],
  "recommendations": ["string"]
}

RULES:
1. high = could cause significant financial or legal harm; medium = unfavourable but negotiable; low = minor or unusual wording
2. One entry per distinct clause; do not repeat the same clause
3. Order risks as they appear in the contract
4. Return ONLY the JSON object — nothing else, no code fences."#;

/// Type-specific review checklist inserted into the prompt.
pub fn focus_areas(contract_type: ContractType) -> &'static str {
    match contract_type {
        ContractType::Employment => {
            "- non-compete and non-solicitation scope\n\
             - termination conditions and notice\n\
             - compensation, bonus and equity terms\n\
             - intellectual property assignment"
        }
        ContractType::Nda => {
            "- definition and breadth of confidential information\n\
             - duration of obligations\n\
             - permitted disclosures and exclusions\n\
             - remedies and injunctive relief"
        }
        ContractType::Sales => {
            "- payment terms and late fees\n\
             - delivery, title and risk of loss\n\
             - warranties and disclaimers\n\
             - limitation of liability"
        }
        ContractType::Lease => {
            "- rent escalation and fees\n\
             - security deposit return\n\
             - maintenance and repair obligations\n\
             - early termination and renewal"
        }
        ContractType::Services => {
            "- scope of services and acceptance\n\
             - payment milestones\n\
             - liability caps and indemnification\n\
             - ownership of deliverables"
        }
        ContractType::Other => {
            "- payment obligations\n\
             - liability and indemnification\n\
             - termination rights\n\
             - dispute resolution and governing law"
        }
    }
}

pub fn build_analysis_prompt(contract_type: ContractType, contract_text: &str) -> String {
    ANALYSIS_PROMPT
        .replace("{contract_type}", contract_type.as_str())
        .replace("{focus_areas}", focus_areas(contract_type))
        .replace("{contract_text}", contract_text)
}
