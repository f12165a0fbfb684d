// Resume parsing prompt. `{resume_text}` is replaced with the user's text.

pub const RESUME_PARSE_PROMPT: &str = r#"You are a resume parsing expert. Parse the following resume content. Please:
1. Normalize all abbreviations and standardize terms to their full form (for example "O.U." becomes "Osmania University", "B.Tech" becomes "Bachelor of Technology").
2. Analyze context for repeated terms: when the same name appears in several places (for example "Google" as both an internship and a certification), align each use with its context.
3. Structure the content into clear sections: personal_information, education, work_experience, skills, certifications, projects, achievements. Omit sections the resume does not support.
4. Normalize dates and correct obvious typographical errors without inventing information.

{json_only}

Resume content:
{resume_text}"#;
