//! Paging and sorting rules shared by every list query.
//!
//! All inputs are lenient: a bad `limit`, `offset`, `sort` or `dir` resolves
//! to its default instead of failing the request.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, EnumString};
use utoipa::ToSchema;

use crate::config::QueryConfig;
use crate::models::ListParams;

/// Resolved `offset`/`limit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u64,
}

impl PageRequest {
    /// - `limit`: positive integer, capped at `config.max_limit`; otherwise `config.default_limit`
    /// - `offset`: non-negative integer; otherwise 0
    pub fn resolve(offset: Option<&str>, limit: Option<&str>, config: &QueryConfig) -> Self {
        let limit = limit
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|n| *n > 0)
            .map(|n| (n as u64).min(config.max_limit))
            .unwrap_or(config.default_limit);

        let offset = offset
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);

        Self { offset, limit }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    /// `asc` is ascending; anything else, including absence, is descending.
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw {
            Some(dir) if dir.trim() == "asc" => SortDirection::Asc,
            _ => SortDirection::Desc,
        }
    }

    /// MongoDB sort order.
    pub fn as_i32(self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Allow-listed sort key of one query. The string form is the stored field name.
pub trait SortKey: Copy + Default + FromStr + AsRef<str> + Send + Sync + 'static {
    fn field(&self) -> &'static str;
}

macro_rules! sort_key {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $field:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, AsRefStr)]
        pub enum $name {
            $($(#[$vmeta])* #[strum(serialize = $field)] $variant),+
        }

        impl SortKey for $name {
            fn field(&self) -> &'static str {
                match self {
                    $($name::$variant => $field),+
                }
            }
        }
    };
}

sort_key!(
    /// Feed: `date` (default), `email`, `event`
    FeedSort {
        #[default]
        Date => "date",
        Email => "email",
        Event => "event",
    }
);

sort_key!(
    /// Message list: `date` (default), `clicked`, `opened`
    MessageSort {
        Clicked => "clicked",
        Opened => "opened",
        #[default]
        Date => "date",
    }
);

sort_key!(
    /// Recipient lists: `last_seen` (default), `email`, `clicked`, `opened`, `delivered`
    RecipientSort {
        #[default]
        LastSeen => "last_seen",
        Email => "email",
        Clicked => "clicked",
        Opened => "opened",
        Delivered => "delivered",
    }
);

/// Primary sort key plus direction. Ties break on `_id` in the same direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sort<K> {
    pub key: K,
    pub direction: SortDirection,
}

impl<K: SortKey> Sort<K> {
    pub fn new(key: K, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Unknown or missing keys fall back to `K::default()`.
    pub fn resolve(sort: Option<&str>, dir: Option<&str>) -> Self {
        let key = sort
            .and_then(|raw| K::from_str(raw.trim()).ok())
            .unwrap_or_default();
        Self::new(key, SortDirection::from_param(dir))
    }
}

/// Sort and page of a plain list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions<K> {
    pub sort: Sort<K>,
    pub page: PageRequest,
}

impl<K: SortKey> ListOptions<K> {
    pub fn resolve(params: &ListParams, config: &QueryConfig) -> Self {
        Self {
            sort: Sort::resolve(params.sort.as_deref(), params.dir.as_deref()),
            page: PageRequest::resolve(params.offset.as_deref(), params.limit.as_deref(), config),
        }
    }
}

/// List envelope. `total` ignores paging; `count` is `data.len()`.
///
/// `total` and `data` come from separate reads, so under concurrent writes
/// they may disagree slightly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Page<T> {
    pub total: u64,
    pub count: u64,
    pub offset: u64,
    pub limit: u64,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(total: u64, page: PageRequest, data: Vec<T>) -> Self {
        Self {
            total,
            count: data.len() as u64,
            offset: page.offset,
            limit: page.limit,
            data,
        }
    }
}

/// Cold recipient list: the page plus the inactivity window that was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ColdRecipientPage<T> {
    pub days: i64,
    #[serde(flatten)]
    pub page: Page<T>,
}
