//! Parsing of import identifiers.
//!
//! Pre-existing credentials are adopted with an identifier of the form
//! `[<folder-segments>/]<domain>/<name>`.

use crate::error::ProviderError;
use crate::id::credential_id;

const IMPORT_FORMAT: &str = "[<folder>/]<domain>/<name>";

/// The logical fields recovered from an import identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportId {
    /// Folder path as written in the identifier, without surrounding slashes.
    pub folder: String,
    /// Credential domain.
    pub domain: String,
    /// Credential name.
    pub name: String,
}

impl ImportId {
    /// Parse `[<folder>/]<domain>/<name>`.
    ///
    /// The last token is the name, the one before it the domain, and
    /// everything preceding them the folder.
    ///
    /// ```
    /// use jenkins_credential_provider::import::ImportId;
    ///
    /// let id = ImportId::parse("teamA/teamB/_/mycred").unwrap();
    /// assert_eq!(id.folder, "teamA/teamB");
    /// assert_eq!(id.domain, "_");
    /// assert_eq!(id.name, "mycred");
    /// ```
    pub fn parse(raw: &str) -> Result<Self, ProviderError> {
        let tokens: Vec<&str> = raw.split('/').collect();
        if tokens.len() < 2 {
            return Err(format_error(raw));
        }

        let name = tokens[tokens.len() - 1];
        let domain = tokens[tokens.len() - 2];
        if name.is_empty() || domain.is_empty() {
            return Err(format_error(raw));
        }

        let folder = tokens[..tokens.len() - 2]
            .join("/")
            .trim_matches('/')
            .to_string();

        Ok(Self {
            folder,
            domain: domain.to_string(),
            name: name.to_string(),
        })
    }

    /// The canonical identifier of the imported credential.
    pub fn credential_id(&self) -> String {
        credential_id(&self.folder, &self.name)
    }
}

fn format_error(raw: &str) -> ProviderError {
    ProviderError::InvalidRequest(format!(
        "import ID '{}' was improperly formatted; imports need to be in the format \"{}\"",
        raw, IMPORT_FORMAT
    ))
}
