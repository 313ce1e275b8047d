//! Recursive descent over the division tables of one province
//!
//! Each level has its own walk function, so the descent depth is fixed at five
//! and no boxed recursion is needed. A branch that cannot be fetched or parsed
//! is handled by the configured `FetchFailurePolicy`: it is either cut short and
//! recorded as a `Truncation`, or it aborts the whole province.

use crate::config::FetchFailurePolicy;
use crate::crawler::fetcher::{FetchFailure, Page, PageFetcher};
use crate::crawler::parser::{parse_table, ParsedTable, ProvinceLink, TableRow};
use crate::division::{DivisionNode, Level};
use crate::{CrawlError, ParseError};
use std::fmt;
use url::Url;

/// Name published for district-only cities of a province ("municipal district")
pub const MUNICIPAL_DISTRICT: &str = "市辖区";

/// Why a branch ended before reaching the village level
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TruncationReason {
    Fetch(FetchFailure),
    Parse(ParseError),

    /// The page loaded but lists no rows of the expected level
    NoRows,
}

impl fmt::Display for TruncationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch(failure) => write!(f, "{}", failure),
            Self::Parse(error) => write!(f, "{}", error),
            Self::NoRows => write!(f, "page lists no rows"),
        }
    }
}

/// A branch cut short by a fetch or parse failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Truncation {
    /// Level of the rows that are missing
    pub level: Level,

    /// Code of the node left without (some of) its children
    pub parent_code: String,

    /// Page that failed
    pub url: String,

    pub reason: TruncationReason,
}

impl fmt::Display for Truncation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} rows under {} ({}): {}",
            self.level, self.parent_code, self.url, self.reason
        )
    }
}

/// A fully walked province and the branches that were cut short
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub province: DivisionNode,
    pub truncations: Vec<Truncation>,
}

impl WalkOutcome {
    /// True when no branch was truncated
    pub fn is_complete(&self) -> bool {
        self.truncations.is_empty()
    }
}

/// Walks one province from its city table down to the villages
#[derive(Debug, Clone)]
pub struct HierarchyWalker {
    fetcher: PageFetcher,
    policy: FetchFailurePolicy,
}

impl HierarchyWalker {
    pub fn new(fetcher: PageFetcher, policy: FetchFailurePolicy) -> Self {
        Self { fetcher, policy }
    }

    /// Builds the complete subtree of a province
    ///
    /// Pages are fetched strictly one after another. Under
    /// `FetchFailurePolicy::Abort` the first failed page or malformed row
    /// fails the call; otherwise failures are collected in the outcome.
    pub async fn walk_province(&self, link: &ProvinceLink) -> Result<WalkOutcome, CrawlError> {
        let mut truncations = Vec::new();
        let mut province = DivisionNode::new(Level::Province, &link.code, &link.name);

        province.children = self
            .walk_cities(&link.url, &link.code, &link.name, &mut truncations)
            .await?;

        tracing::debug!(
            "Walked province {} ({}): {} nodes, {} villages",
            link.name,
            link.code,
            province.node_count(),
            province.village_count()
        );

        Ok(WalkOutcome {
            province,
            truncations,
        })
    }

    async fn walk_cities(
        &self,
        url: &Url,
        province_code: &str,
        province_name: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let Some(page) = self
            .load_page(url, Level::City, province_code, truncations)
            .await?
        else {
            return Ok(Vec::new());
        };
        let table = self.read_table(&page, Level::City, province_code, truncations)?;

        // Every province has cities; an empty page is a challenge or error page
        if table.is_empty() {
            tracing::warn!(
                parent = province_code,
                url = %page.url,
                "Branch truncated: city page lists no rows"
            );
            truncations.push(Truncation {
                level: Level::City,
                parent_code: province_code.to_string(),
                url: page.url.to_string(),
                reason: TruncationReason::NoRows,
            });
            return Ok(Vec::new());
        }

        let mut cities = Vec::with_capacity(table.rows.len());
        for row in table.rows {
            // District-only cities carry the province's label
            let name = if row.name == MUNICIPAL_DISTRICT {
                province_name.to_string()
            } else {
                row.name
            };
            let mut city = DivisionNode::new(Level::City, row.code, name);

            if let Some(link) = &row.link {
                city.children = self
                    .walk_counties(link, &city.code, &city.name, truncations)
                    .await?;
            }
            cities.push(city);
        }

        Ok(cities)
    }

    async fn walk_counties(
        &self,
        url: &Url,
        city_code: &str,
        city_name: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let Some(page) = self
            .load_page(url, Level::County, city_code, truncations)
            .await?
        else {
            return Ok(Vec::new());
        };
        let table = self.read_table(&page, Level::County, city_code, truncations)?;

        if table.is_empty() {
            return self
                .walk_municipality(&page, city_code, city_name, truncations)
                .await;
        }

        let mut counties = Vec::with_capacity(table.rows.len());
        for row in table.rows {
            let mut county = DivisionNode::new(Level::County, row.code, row.name);
            if let Some(link) = &row.link {
                county.children = self.walk_towns(link, &county.code, truncations).await?;
            }
            counties.push(county);
        }

        Ok(counties)
    }

    /// Handles a city without a county level
    ///
    /// The city's page lists towns directly. A single county mirroring the
    /// city's code and name is synthesized to hold them.
    async fn walk_municipality(
        &self,
        page: &Page,
        city_code: &str,
        city_name: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let table = self.read_table(page, Level::Town, city_code, truncations)?;
        if table.rows.is_empty() {
            return Ok(Vec::new());
        }

        tracing::debug!(
            "City {} ({}) has no county level, attaching {} towns directly",
            city_name,
            city_code,
            table.rows.len()
        );

        let mut county = DivisionNode::new(Level::County, city_code, city_name);
        county.children = self.build_towns(table.rows, truncations).await?;
        Ok(vec![county])
    }

    async fn walk_towns(
        &self,
        url: &Url,
        county_code: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let Some(page) = self
            .load_page(url, Level::Town, county_code, truncations)
            .await?
        else {
            return Ok(Vec::new());
        };
        let table = self.read_table(&page, Level::Town, county_code, truncations)?;

        self.build_towns(table.rows, truncations).await
    }

    async fn build_towns(
        &self,
        rows: Vec<TableRow>,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let mut towns = Vec::with_capacity(rows.len());
        for row in rows {
            let mut town = DivisionNode::new(Level::Town, row.code, row.name);
            if let Some(link) = &row.link {
                town.children = self.walk_villages(link, &town.code, truncations).await?;
            }
            towns.push(town);
        }
        Ok(towns)
    }

    async fn walk_villages(
        &self,
        url: &Url,
        town_code: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Vec<DivisionNode>, CrawlError> {
        let Some(page) = self
            .load_page(url, Level::Village, town_code, truncations)
            .await?
        else {
            return Ok(Vec::new());
        };
        let table = self.read_table(&page, Level::Village, town_code, truncations)?;

        Ok(table
            .rows
            .into_iter()
            .map(|row| {
                DivisionNode::village(row.code, row.name, row.region_type.unwrap_or_default())
            })
            .collect())
    }

    /// Fetches the page listing `level` rows beneath `parent_code`
    ///
    /// Returns `Ok(None)` when the page is given up on and the branch is
    /// truncated.
    async fn load_page(
        &self,
        url: &Url,
        level: Level,
        parent_code: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<Option<Page>, CrawlError> {
        match self.fetcher.fetch(url).await {
            Ok(page) => Ok(Some(page)),
            Err(failure) => match self.policy {
                FetchFailurePolicy::Abort => Err(failure.into()),
                FetchFailurePolicy::Truncate => {
                    tracing::warn!(
                        parent = parent_code,
                        level = %level,
                        url = %url,
                        "Branch truncated: {}",
                        failure
                    );
                    truncations.push(Truncation {
                        level,
                        parent_code: parent_code.to_string(),
                        url: url.to_string(),
                        reason: TruncationReason::Fetch(failure),
                    });
                    Ok(None)
                }
            },
        }
    }

    /// Parses `level` rows from a page, applying the failure policy to bad rows
    fn read_table(
        &self,
        page: &Page,
        level: Level,
        parent_code: &str,
        truncations: &mut Vec<Truncation>,
    ) -> Result<ParsedTable, CrawlError> {
        let table = parse_table(&page.body, &page.url, level)?;

        for error in &table.errors {
            if self.policy == FetchFailurePolicy::Abort {
                return Err(error.clone().into());
            }

            tracing::warn!(
                parent = parent_code,
                level = %level,
                url = %page.url,
                "Skipping malformed row: {}",
                error
            );
            truncations.push(Truncation {
                level,
                parent_code: parent_code.to_string(),
                url: page.url.to_string(),
                reason: TruncationReason::Parse(error.clone()),
            });
        }

        Ok(table)
    }
}
