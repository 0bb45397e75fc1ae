use std::collections::HashMap;

use super::{error::ApiError, schema::Id};

pub type QueryData = HashMap<String, String>;

/// Typed access to query string parameters.
#[derive(Debug, Default)]
pub struct Form {
    inner: QueryData,
}

impl Form {
    pub fn from_data(data: QueryData) -> Self {
        Self { inner: data }
    }

    /// Integer flag: absent is `false`, any non-zero integer is `true`.
    pub fn get_flag(&self, key: &str) -> Result<bool, ApiError> {
        match self.inner.get(key) {
            Some(value) => value
                .trim()
                .parse::<i64>()
                .map(|v| v != 0)
                .map_err(|_| ApiError::InvalidRequest(format!("{key} must be an integer"))),
            None => Ok(false),
        }
    }

    /// Comma separated ids. Absent or blank parameters yield `None`.
    pub fn get_id_list(&self, key: &str) -> Result<Option<Vec<Id>>, ApiError> {
        let value = match self.inner.get(key) {
            Some(value) if !value.trim().is_empty() => value,
            _ => return Ok(None),
        };

        value
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.parse::<Id>().map_err(|_| {
                    ApiError::InvalidRequest(format!("{key} must be a comma separated list of ids"))
                })
            })
            .collect::<Result<Vec<Id>, ApiError>>()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn flag_defaults_to_false() {
        assert!(!form(&[]).get_flag("assigned_only").unwrap());
        assert!(!form(&[("assigned_only", "0")]).get_flag("assigned_only").unwrap());
        assert!(form(&[("assigned_only", "1")]).get_flag("assigned_only").unwrap());
        assert!(form(&[("assigned_only", "2")]).get_flag("assigned_only").unwrap());
    }

    #[test]
    fn flag_rejects_non_integers() {
        assert!(matches!(
            form(&[("assigned_only", "yes")]).get_flag("assigned_only"),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn id_list_splits_on_commas() {
        assert_eq!(
            form(&[("tags", "1,2, 3")]).get_id_list("tags").unwrap(),
            Some(vec![1, 2, 3])
        );
        assert_eq!(form(&[("tags", "4,")]).get_id_list("tags").unwrap(), Some(vec![4]));
        assert_eq!(form(&[("tags", "")]).get_id_list("tags").unwrap(), None);
        assert_eq!(form(&[]).get_id_list("tags").unwrap(), None);
    }

    #[test]
    fn id_list_rejects_garbage() {
        assert!(form(&[("ingredients", "1,abc")])
            .get_id_list("ingredients")
            .is_err());
    }
}
