//! Prompt text for the suitability question.
//!
//! Everything here is a pure function of the listing and the profile, so the
//! same inputs always produce byte-identical prompts.

use jobfit_core::{ApplicantProfile, ExperienceRange, JobListing, SalaryRange};

const INSTRUCTIONS: &str = "\
You are a job match evaluator. Decide whether the applicant described below is a \
suitable candidate for the job listing described below.

You receive two inputs:
1. A summary of the applicant's profile
2. The details of one job listing

Weigh the applicant's skills, years of experience, seniority, industry background \
and any stated qualifications against what the listing asks for.

Answer with exactly one word: `true` if the applicant is suitable for the job, or \
`false` if the applicant is not. Do not explain your answer and do not add any \
other text.";

const NOT_SPECIFIED: &str = "Not specified";

fn join_or_unspecified<'a>(items: impl IntoIterator<Item = &'a String>) -> String {
    let joined = items
        .into_iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        NOT_SPECIFIED.to_string()
    } else {
        joined
    }
}

fn describe_experience(experience: &ExperienceRange) -> String {
    match (experience.min_years, experience.max_years) {
        (Some(min), Some(max)) => format!("{min} - {max} years"),
        (Some(min), None) => format!("{min}+ years"),
        (None, Some(max)) => format!("up to {max} years"),
        (None, None) => experience
            .label
            .clone()
            .unwrap_or_else(|| NOT_SPECIFIED.to_string()),
    }
}

fn describe_salary(salary: &SalaryRange) -> String {
    let Some(salary) = salary.disclosed() else {
        return "Not disclosed".to_string();
    };
    let band = match (salary.min, salary.max) {
        (Some(min), Some(max)) => format!("{min} - {max}"),
        (Some(amount), None) | (None, Some(amount)) => amount.to_string(),
        (None, None) => return "Not disclosed".to_string(),
    };
    match &salary.currency {
        Some(currency) => format!("{currency} {band}"),
        None => band,
    }
}

/// Human-readable block describing one listing.
pub fn format_listing(listing: &JobListing) -> String {
    format!(
        "Job Title: {}\n\
         Company: {}\n\
         Job Type: {}\n\
         Industries: {}\n\
         Location: {}\n\
         Experience Required: {}\n\
         Skills Required: {}\n\
         Salary: {}\n\
         Description: {}",
        listing.title,
        listing.company,
        listing.employment_type,
        join_or_unspecified(&listing.industries),
        listing.location,
        describe_experience(&listing.experience),
        join_or_unspecified(&listing.required_skills),
        describe_salary(&listing.salary),
        listing.description,
    )
}

pub fn build_prompt(listing: &JobListing, profile: &ApplicantProfile) -> String {
    format!(
        "{INSTRUCTIONS}\n\n\
         --- Start Applicant's Profile Summary ---\n\
         {}\n\
         --- End Applicant's Profile Summary ---\n\n\
         --- Start Job Listing Detail ---\n\
         {}\n\
         --- End Job Listing Detail ---\n",
        profile.summary(),
        format_listing(listing),
    )
}

/// `true` only for a reply that is the bare word "true", in any case, once
/// surrounding whitespace is trimmed.
pub fn parse_verdict(content: &str) -> bool {
    content.trim().to_lowercase() == "true"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::listing;
    use jobfit_core::Location;

    #[test]
    fn verdict_accepts_only_the_bare_word() {
        for yes in ["true", "True", " true ", "TRUE\n"] {
            assert!(parse_verdict(yes), "{yes:?} should be true");
        }
        for no in ["false", "yes", "", "true, I think so", "`true`", "not true"] {
            assert!(!parse_verdict(no), "{no:?} should be false");
        }
    }

    #[test]
    fn prompt_wraps_profile_then_listing() {
        let profile = ApplicantProfile::new("Rust and Postgres, 6 years");
        let prompt = build_prompt(&listing("job-1", "Backend Engineer"), &profile);

        let profile_start = prompt.find("--- Start Applicant's Profile Summary ---").expect("start");
        let profile_end = prompt.find("--- End Applicant's Profile Summary ---").expect("end");
        let listing_start = prompt.find("--- Start Job Listing Detail ---").expect("start");
        let listing_end = prompt.find("--- End Job Listing Detail ---").expect("end");
        assert!(profile_start < profile_end && profile_end < listing_start && listing_start < listing_end);

        let profile_body = &prompt[profile_start..profile_end];
        assert!(profile_body.contains("Rust and Postgres, 6 years"));
        let listing_body = &prompt[listing_start..listing_end];
        assert!(listing_body.contains("Job Title: Backend Engineer"));
        assert!(prompt.contains("exactly one word"));
    }

    #[test]
    fn prompt_is_deterministic() {
        let profile = ApplicantProfile::new("profile");
        let job = listing("job-1", "Backend Engineer");
        assert_eq!(build_prompt(&job, &profile), build_prompt(&job.clone(), &profile));
    }

    #[test]
    fn hidden_salary_never_reaches_the_prompt() {
        let mut job = listing("job-1", "Backend Engineer");
        job.salary = SalaryRange {
            visible: false,
            currency: Some("IDR".into()),
            min: Some(12_000_000.0),
            max: Some(18_000_000.0),
            avg: None,
        };
        let text = format_listing(&job);
        assert!(text.contains("Salary: Not disclosed"));
        assert!(!text.contains("12000000"));

        job.salary.visible = true;
        assert!(format_listing(&job).contains("Salary: IDR 12000000 - 18000000"));
    }

    #[test]
    fn listing_block_renders_every_field() {
        let mut job = listing("job-1", "Data Engineer");
        job.location = Location::OnSite {
            city: "Surabaya".into(),
            country: "Indonesia".into(),
        };
        job.industries = ["Logistics".to_string(), "E-commerce".to_string()].into();
        job.required_skills = ["Python".to_string(), "Airflow".to_string()].into();
        job.experience = ExperienceRange {
            label: None,
            min_years: Some(2),
            max_years: Some(4),
        };

        assert_eq!(
            format_listing(&job),
            "Job Title: Data Engineer\n\
             Company: Sakoo\n\
             Job Type: Full-time\n\
             Industries: E-commerce, Logistics\n\
             Location: Surabaya, Indonesia\n\
             Experience Required: 2 - 4 years\n\
             Skills Required: Airflow, Python\n\
             Salary: Not disclosed\n\
             Description: Build and run services."
        );
    }

    #[test]
    fn partial_experience_and_empty_sets_are_spelled_out() {
        let mut job = listing("job-1", "Intern");
        job.industries.clear();
        job.experience = ExperienceRange {
            label: None,
            min_years: Some(1),
            max_years: None,
        };
        let text = format_listing(&job);
        assert!(text.contains("Industries: Not specified"));
        assert!(text.contains("Experience Required: 1+ years"));
        assert!(text.contains("Location: Remote"));
    }
}
