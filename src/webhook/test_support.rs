//! In-memory search backend for webhook tests.

use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use crate::webhook::npm_search::{
    PackageSearch, Score, ScoreDetail, SearchObject, SearchPackage, SearchParams, SearchResult,
};

/// Returns a fixed hit list and records every query.
pub struct FakeSearch {
    names: Vec<&'static str>,
    total: u64,
    pub queries: Mutex<Vec<SearchParams>>,
}

impl FakeSearch {
    pub fn returning(names: &[&'static str]) -> Self {
        Self {
            names: names.to_vec(),
            total: names.len() as u64,
            queries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PackageSearch for FakeSearch {
    async fn search(&self, params: &SearchParams) -> Result<SearchResult> {
        self.queries.lock().expect("lock").push(params.clone());
        let objects = self
            .names
            .iter()
            .map(|name| SearchObject {
                package: SearchPackage {
                    name: name.to_string(),
                    version: None,
                    description: None,
                    keywords: Vec::new(),
                    date: None,
                },
                score: Score {
                    total: 1.0,
                    detail: ScoreDetail {
                        quality: 1.0,
                        popularity: 1.0,
                        maintenance: 1.0,
                    },
                },
                search_score: 1.0,
            })
            .collect();
        Ok(SearchResult {
            objects,
            total: self.total,
            time: "now".into(),
        })
    }
}
