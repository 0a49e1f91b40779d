use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no lockfile entry found for '{0}'")]
    MissingPackage(String),
    #[error("malformed yarn.lock: {0}")]
    MalformedYarn1(String),
    #[error("unable to parse berry lockfile: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}
