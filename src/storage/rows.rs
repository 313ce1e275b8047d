//! Flattening of a walked province into village rows

use crate::division::{DivisionNode, Level};

/// One village with its full ancestor chain, as stored in `all_division`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivisionRow {
    /// Same value as `village_code`
    pub division_id: String,
    pub province_name: String,
    pub province_code: String,
    pub city_name: String,
    pub city_code: String,
    pub county_name: String,
    pub county_code: String,
    pub town_name: String,
    pub town_code: String,
    pub village_name: String,
    pub village_code: String,
    pub address_name: String,
    pub region_type: String,
    pub active: bool,
}

/// Produces one row per village of the province, in page order
///
/// Branches that stop above the village level contribute no rows.
pub fn flatten_province(province: &DivisionNode) -> Vec<DivisionRow> {
    let mut rows = Vec::with_capacity(province.village_count());

    for city in &province.children {
        for county in &city.children {
            for town in &county.children {
                for village in town.children.iter().filter(|n| n.level == Level::Village) {
                    rows.push(DivisionRow {
                        division_id: village.code.clone(),
                        province_name: province.name.clone(),
                        province_code: province.code.clone(),
                        city_name: city.name.clone(),
                        city_code: city.code.clone(),
                        county_name: county.name.clone(),
                        county_code: county.code.clone(),
                        town_name: town.name.clone(),
                        town_code: town.code.clone(),
                        village_name: village.name.clone(),
                        village_code: village.code.clone(),
                        address_name: address_name(province, city, county, town),
                        region_type: village.region_type.clone().unwrap_or_default(),
                        active: true,
                    });
                }
            }
        }
    }

    rows
}

/// Composite address in the published convention: ancestors, then the province again
fn address_name(
    province: &DivisionNode,
    city: &DivisionNode,
    county: &DivisionNode,
    town: &DivisionNode,
) -> String {
    [
        province.name.as_str(),
        city.name.as_str(),
        county.name.as_str(),
        town.name.as_str(),
        province.name.as_str(),
    ]
    .concat()
}
