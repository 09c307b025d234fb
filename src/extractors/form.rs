//! Form bodies: url-encoded or multipart, read into text fields plus buffered uploads.

use crate::blob::Upload;
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequest, Multipart, Request},
    http::header,
    Form,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Fields never echoed back when a form is re-rendered.
const SECRET_FIELDS: &[&str] = &["password", "password1", "password2"];

#[derive(Clone, Debug, Default)]
pub struct FormData {
    fields: BTreeMap<String, String>,
    files: HashMap<String, Upload>,
}

impl FormData {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        FormData {
            fields: pairs.into_iter().collect(),
            files: HashMap::new(),
        }
    }

    /// Flat JSON object → text fields. Numbers become their decimal text, `true` becomes `on`,
    /// `false` and `null` become blank.
    pub fn from_json(value: Value) -> Result<Self, AppError> {
        let Value::Object(map) = value else {
            return Err(AppError::BadRequest("body must be a JSON object".into()));
        };
        let mut fields = BTreeMap::new();
        for (k, v) in map {
            let text = match v {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(true) => "on".to_string(),
                Value::Bool(false) | Value::Null => String::new(),
                _ => return Err(AppError::BadRequest(format!("field {} must be a scalar", k))),
            };
            fields.insert(k, text);
        }
        Ok(FormData {
            fields,
            files: HashMap::new(),
        })
    }

    pub fn with_file(mut self, name: &str, upload: Upload) -> Self {
        self.files.insert(name.to_string(), upload);
        self
    }

    /// Field text, or blank when missing.
    pub fn get(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }

    pub fn file(&self, name: &str) -> Option<&Upload> {
        self.files.get(name)
    }

    /// Fields whose name starts with `prefix`, yielded as (rest of name, value).
    pub fn with_prefix<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.fields
            .iter()
            .filter_map(move |(k, v)| k.strip_prefix(prefix).map(|rest| (rest, v.as_str())))
    }

    /// Bind the text fields to an input struct. Unknown fields are ignored.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        let value = serde_json::to_value(&self.fields).map_err(|e| AppError::Internal(e.to_string()))?;
        serde_json::from_value(value).map_err(|e| AppError::BadRequest(format!("malformed form: {}", e)))
    }

    /// Submitted values for re-rendering, without passwords.
    pub fn echo(&self) -> Value {
        let kept: BTreeMap<&str, &str> = self
            .fields
            .iter()
            .filter(|(k, _)| !SECRET_FIELDS.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        serde_json::to_value(kept).unwrap_or(Value::Null)
    }

    async fn from_multipart(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut form = FormData::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match field.file_name().map(str::to_string) {
                Some(filename) => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                    // A file input left empty still sends a part with no name and no content.
                    if filename.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    form.files.insert(
                        name,
                        Upload {
                            filename,
                            content_type,
                            bytes: bytes.to_vec(),
                        },
                    );
                }
                None => {
                    let text = field.text().await.map_err(|e| AppError::BadRequest(e.to_string()))?;
                    form.fields.insert(name, text);
                }
            }
        }
        Ok(form)
    }
}

#[async_trait]
impl<S> FromRequest<S> for FormData
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));
        if is_multipart {
            let multipart = Multipart::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Self::from_multipart(multipart).await
        } else {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            Ok(FormData::from_pairs(pairs))
        }
    }
}
