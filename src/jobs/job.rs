use serde::Deserialize;

/// One unit of fetch-parse-store work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    id: u64,
    url: String,
}

impl Job {
    pub fn new(id: u64, url: impl Into<String>) -> Self {
        Self {
            id,
            url: url.into(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Builds one job per locator, numbering them `1..=n` in input order.
pub fn jobs_from_urls<I, S>(urls: I) -> Vec<Job>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    urls.into_iter()
        .enumerate()
        .map(|(index, url)| Job::new(index as u64 + 1, url))
        .collect()
}

/// Todo record decoded from a fetched payload and written to the `todos` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Record {
    pub id: i64,
    pub title: String,
    pub completed: bool,
}
