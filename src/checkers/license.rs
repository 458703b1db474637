//! License file presence and recognition

use crate::capability::{Checker, RepositoryContext};
use crate::checkers::{find_file, status_for};
use crate::core::{CheckError, CheckResult, HealthStatus, Issue};
use async_trait::async_trait;
use std::time::Instant;

const CANDIDATES: &[&str] = &[
    "license",
    "license.md",
    "license.txt",
    "licence",
    "licence.md",
    "copying",
];

/// Phrases identifying common licenses, checked in order
const KNOWN_LICENSES: &[(&str, &str)] = &[
    ("Apache License", "Apache-2.0"),
    ("MIT License", "MIT"),
    ("Permission is hereby granted, free of charge", "MIT"),
    ("GNU AFFERO GENERAL PUBLIC LICENSE", "AGPL"),
    ("GNU LESSER GENERAL PUBLIC LICENSE", "LGPL"),
    ("GNU GENERAL PUBLIC LICENSE", "GPL"),
    ("Mozilla Public License", "MPL-2.0"),
    ("Redistribution and use in source and binary forms", "BSD"),
    ("This is free and unencumbered software", "Unlicense"),
];

pub struct LicenseChecker;

impl LicenseChecker {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LicenseChecker {
    fn default() -> Self {
        Self::new()
    }
}

/// Identify a license from its text
pub fn identify_license(text: &str) -> Option<&'static str> {
    KNOWN_LICENSES
        .iter()
        .find(|(phrase, _)| text.contains(phrase))
        .map(|(_, id)| *id)
}

#[async_trait]
impl Checker for LicenseChecker {
    fn id(&self) -> &str {
        "license"
    }

    fn name(&self) -> &str {
        "License"
    }

    fn category(&self) -> &str {
        "legal"
    }

    async fn check(&self, ctx: &RepositoryContext) -> Result<CheckResult, CheckError> {
        let started = Instant::now();
        let mut result = CheckResult::new(self.id(), self.name(), self.category(), 100);

        let root = ctx.repository.path.clone();
        let found = tokio::task::spawn_blocking(move || -> std::io::Result<_> {
            match find_file(&root, CANDIDATES)? {
                Some(path) => {
                    let content = std::fs::read_to_string(&path)?;
                    Ok(Some((path, content)))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| CheckError::Execution(e.to_string()))??;

        match found {
            None => {
                result = result
                    .with_status(status_for(ctx.config.severity))
                    .with_score(0)
                    .with_issue(Issue::new(
                        "missing_license",
                        ctx.config.severity,
                        "Repository has no license file",
                    ));
            }
            Some((path, content)) => {
                let file = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                result = result.with_metric("file", file);

                match identify_license(&content) {
                    Some(license) => {
                        result = result.with_metric("license", license);
                    }
                    None => {
                        result = result
                            .with_status(HealthStatus::Warning)
                            .with_score(70)
                            .with_warning("License text does not match a known license");
                    }
                }
            }
        }

        result.duration = started.elapsed();
        Ok(result)
    }
}
