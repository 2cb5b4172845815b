//! Meal planner client (Supabase REST)

use chrono::{Duration, Local, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use super::{MealPlan, MealSlot};

const DEFAULT_SLOT: &str = "dinner";
const DEFAULT_DISH: &str = "Planned meal";

/// Errors that can occur when fetching the meal plan
#[derive(Debug, Error)]
pub enum MealsError {
    #[error("Meal planner credentials not configured")]
    NotConfigured,

    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Meal planner sign-in failed (HTTP {0})")]
    AuthFailed(u16),

    #[error("Meal planner returned HTTP {0}")]
    Status(u16),
}

/// Supabase project and login used by the meal planner
#[derive(Debug, Clone, Default)]
pub struct MealsCredentials {
    pub supabase_url: String,
    pub anon_key: String,
    pub email: String,
    pub password: String,
}

impl MealsCredentials {
    fn is_complete(&self) -> bool {
        [&self.supabase_url, &self.anon_key, &self.email, &self.password]
            .iter()
            .all(|v| !v.trim().is_empty())
    }
}

/// Client for the planned meals table
#[derive(Debug, Clone)]
pub struct MealsClient {
    client: Client,
    credentials: MealsCredentials,
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// One row of `planned_meals` joined with `meals(name)`
#[derive(Debug, Deserialize)]
pub struct PlannedMealRow {
    pub date: String,
    #[serde(default)]
    pub slot: Option<String>,
    #[serde(default)]
    pub meals: Option<MealRef>,
}

#[derive(Debug, Deserialize)]
pub struct MealRef {
    #[serde(default)]
    pub name: Option<String>,
}

impl MealsClient {
    pub fn new(client: Client, credentials: MealsCredentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Sign in and fetch the meals planned for today and tomorrow
    pub async fn fetch_meal_plan(&self) -> Result<MealPlan, MealsError> {
        if !self.credentials.is_complete() {
            return Err(MealsError::NotConfigured);
        }
        let token = self.authenticate().await?;

        let today = Local::now().date_naive();
        let tomorrow = today + Duration::days(1);
        let url = format!(
            "{}/rest/v1/planned_meals?select=*,meals(name)&date=gte.{}&date=lte.{}",
            self.base_url(),
            today,
            tomorrow
        );

        let response = self
            .client
            .get(url)
            .header("apikey", &self.credentials.anon_key)
            .bearer_auth(token)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MealsError::Status(status.as_u16()));
        }

        let rows: Vec<PlannedMealRow> = response.json().await?;
        tracing::debug!(rows = rows.len(), "planned meals fetched");
        Ok(group_meals(rows, today))
    }

    fn base_url(&self) -> &str {
        self.credentials.supabase_url.trim_end_matches('/')
    }

    async fn authenticate(&self) -> Result<String, MealsError> {
        let url = format!("{}/auth/v1/token?grant_type=password", self.base_url());
        let response = self
            .client
            .post(url)
            .header("apikey", &self.credentials.anon_key)
            .json(&PasswordGrant {
                email: &self.credentials.email,
                password: &self.credentials.password,
            })
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MealsError::AuthFailed(status.as_u16()));
        }
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }
}

/// Group rows into today's and tomorrow's slots
pub fn group_meals(rows: Vec<PlannedMealRow>, today: NaiveDate) -> MealPlan {
    let today_str = today.to_string();
    let tomorrow_str = (today + Duration::days(1)).to_string();

    let mut today_slots: BTreeMap<(u8, String), Vec<String>> = BTreeMap::new();
    let mut tomorrow_slots: BTreeMap<(u8, String), Vec<String>> = BTreeMap::new();

    for row in rows {
        let target = if row.date == today_str {
            &mut today_slots
        } else if row.date == tomorrow_str {
            &mut tomorrow_slots
        } else {
            continue;
        };
        let slot = capitalize(row.slot.as_deref().unwrap_or(DEFAULT_SLOT));
        let dish = row
            .meals
            .and_then(|m| m.name)
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_DISH.to_string());
        target.entry((slot_rank(&slot), slot)).or_default().push(dish);
    }

    MealPlan {
        today: into_slots(today_slots),
        tomorrow: into_slots(tomorrow_slots),
    }
}

fn into_slots(map: BTreeMap<(u8, String), Vec<String>>) -> Vec<MealSlot> {
    map.into_iter()
        .map(|((_, slot), dishes)| MealSlot { slot, dishes })
        .collect()
}

fn slot_rank(slot: &str) -> u8 {
    match slot {
        "Breakfast" => 0,
        "Lunch" => 1,
        "Dinner" => 2,
        _ => 3,
    }
}

fn capitalize(slot: &str) -> String {
    let slot = if slot.is_empty() { DEFAULT_SLOT } else { slot };
    let mut chars = slot.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
