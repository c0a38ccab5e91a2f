use crate::domain::{CategoryInput, ItemForm, ProjectForm};
use crate::error::{ActionError, ActionResult};

/// Trimmed `value`, or a validation error carrying `message` when blank.
pub fn required(value: &str, message: &str) -> ActionResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ActionError::Validation(message.to_string()))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Blank notes are stored as null.
pub fn optional_notes(notes: Option<&str>) -> Option<String> {
    notes
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

pub fn validate_project_form(form: &ProjectForm) -> ActionResult<ProjectForm> {
    let name = required(&form.name, "Name is required")?;
    if form.categories.is_empty() {
        return Err(ActionError::Validation(
            "At least one category is required".to_string(),
        ));
    }

    let categories = form
        .categories
        .iter()
        .map(|c| {
            Ok(CategoryInput {
                id: c.id,
                name: required(&c.name, "Category name is required")?,
            })
        })
        .collect::<ActionResult<Vec<_>>>()?;

    Ok(ProjectForm { name, categories })
}

pub fn validate_item_form(form: &ItemForm) -> ActionResult<ItemForm> {
    Ok(ItemForm {
        project_id: form.project_id,
        category_id: form.category_id,
        name: required(&form.name, "Name is required")?,
        notes: optional_notes(form.notes.as_deref()),
    })
}
