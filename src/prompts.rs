//! Instructions sent to the vision model.
//!
//! Every prompt lives here so wording changes never touch the scan loop,
//! and tests can inspect the exact text without a live model.

/// Output label and object of interest for the account owner.
pub const OWNER_NAME_LABEL: &str = "Account owner name";

/// Output label and object of interest for the total portfolio value.
pub const PORTFOLIO_VALUE_LABEL: &str = "Portfolio value";

/// Output label and object of interest for the holdings table.
pub const HOLDINGS_LABEL: &str = "Name and cost basis of each holding";

/// Template for questions with exactly one answer per document.
///
/// `{object_of_interest}` is replaced by [`single_entity_prompt`].
pub const SINGLE_ENTITY_PROMPT: &str = r#"You are an investment analyst reviewing documents for critical information.
In this image, what is the {object_of_interest}?
Don't make anything up. If it is not present or there is nothing relevant, simply return an empty string."#;

/// Template for repeated structured records (one dictionary per item).
pub const MULTIPLE_OBJECTS_PROMPT: &str = r#"You are an investment analyst reviewing documents for critical information.
In this image, please extract all occurrences of the {object_of_interest} and return them in a structured format as a JSON list of dictionaries.
Each dictionary should represent one item and should contain any relevant attributes.
The keys in the dictionaries must be strings that are all lowercase with no empty spaces, only underscores.
For example, if we were looking for the name and cost basis of holdings, the resulting dictionary should take the format of {"name": extracted_name, "cost_basis": extracted_cost_basis}.
Don't make anything up. If nothing is present or relevant, simply return an empty list."#;

const PLACEHOLDER: &str = "{object_of_interest}";

/// Build a single-answer prompt for `object_of_interest`.
pub fn single_entity_prompt(object_of_interest: &str) -> String {
    SINGLE_ENTITY_PROMPT.replace(PLACEHOLDER, object_of_interest)
}

/// Build a list-of-records prompt for `object_of_interest`.
pub fn multiple_objects_prompt(object_of_interest: &str) -> String {
    MULTIPLE_OBJECTS_PROMPT.replace(PLACEHOLDER, object_of_interest)
}
