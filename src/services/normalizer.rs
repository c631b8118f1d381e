//! Turns whatever JSON the model produced into ordered, renderable sections.
//!
//! Models are loosely instructed, so the same concept shows up under many
//! keys and shapes. All of that tolerance lives here; everything downstream
//! works with [`Section`] and [`Item`].

use serde_json::{Map, Value};

use crate::models::suggestion::{Card, DayPlan, Item, Section};
use crate::services::itinerary_generation_service::parse_model_json;

const TITLE_KEYS: &[&str] = &["name", "title", "place", "label"];
const SUBTITLE_KEYS: &[&str] = &["address", "location", "city", "area", "venue", "neighborhood"];
const DESCRIPTION_KEYS: &[&str] = &["description", "summary", "details", "notes", "famousDish"];
const RATING_KEYS: &[&str] = &["rating", "stars"];
const PRICE_KEYS: &[&str] = &["price", "cost", "budget", "totalCost", "minCost", "total"];
const CATEGORY_KEYS: &[&str] = &["category", "type", "cuisine", "cuisineType", "kind"];
const TIME_KEYS: &[&str] = &["time", "startTime", "open", "when"];
const IMAGE_KEYS: &[&str] = &["image", "imageUrl", "imageURL", "photo", "thumbnail", "cover", "img"];
const DETAIL_KEYS: &[&str] = &[
    "features",
    "amenities",
    "highlights",
    "tags",
    "recommendedRestaurants",
    "breakdown",
];

// Keys whose presence marks an object as a single record rather than a
// collection keyed by labels. "budget" is left out: it is as often a label.
const RECORD_MARKERS: &[&[&str]] = &[
    TITLE_KEYS,
    SUBTITLE_KEYS,
    DESCRIPTION_KEYS,
    DETAIL_KEYS,
    &["price", "cost", "totalCost", "minCost", "total"],
];

const DAY_META_KEYS: &[&str] = &["day", "date", "title", "label", "name"];
const ACTIVITY_LIST_KEYS: &[&str] = &["activities", "items", "plan", "schedule", "places"];
const ACTIVITY_TEXT_KEYS: &[&str] = &["description", "activity", "name", "title", "summary"];
const ACTIVITY_PLACE_KEYS: &[&str] = &["place", "location", "venue", "address"];
const TRANSPORT_COST_KEYS: &[&str] = &["minTransportCost", "transportCost", "transport_cost"];

const HIGHLIGHTS_KEY: &str = "highlights";
const HIGHLIGHTS_TITLE: &str = "Highlights";
const ITINERARY_TITLE: &str = "Itinerary";

pub fn to_sections(raw: &Value) -> Vec<Section> {
    match raw {
        Value::Null => Vec::new(),
        Value::String(text) => sections_from_text(text),
        Value::Array(values) => vec![Section {
            key: HIGHLIGHTS_KEY.to_string(),
            title: HIGHLIGHTS_TITLE.to_string(),
            items: collect_items(values.iter().map(|v| (None, v)), HIGHLIGHTS_KEY),
        }],
        Value::Object(map) => map
            .iter()
            .filter(|(_, value)| !value.is_null())
            .map(|(key, value)| section_for(key, value))
            .collect(),
        scalar => vec![highlights_text(scalar_text(scalar).unwrap_or_default())],
    }
}

fn sections_from_text(text: &str) -> Vec<Section> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    match parse_model_json(trimmed) {
        // A JSON string literal would recurse forever; treat it as text.
        Some(Value::String(inner)) => vec![highlights_text(inner)],
        Some(parsed) => to_sections(&parsed),
        None => vec![highlights_text(trimmed.to_string())],
    }
}

fn highlights_text(text: String) -> Section {
    Section {
        key: HIGHLIGHTS_KEY.to_string(),
        title: HIGHLIGHTS_TITLE.to_string(),
        items: vec![Item::Text { text }],
    }
}

fn section_for(key: &str, value: &Value) -> Section {
    let title = section_title(key);
    let items = if title == ITINERARY_TITLE {
        itinerary_items(value)
    } else {
        section_items(key, value)
    };
    Section {
        key: key.to_string(),
        title,
        items,
    }
}

pub fn section_title(key: &str) -> String {
    let exact = match key {
        "hotels" | "accommodations" | "stays" => Some("Hotels"),
        "restaurants" | "food" | "eateries" => Some("Restaurants"),
        "meals" => Some("Meals"),
        "events" => Some("Local Events"),
        "activities" => Some("Activities"),
        "sightseeing" => Some("Sightseeing"),
        "attractions" => Some("Attractions"),
        "itinerary" => Some("Itinerary"),
        "pointsOfInterest" => Some("Points of Interest"),
        "estimatedTotal" => Some("Estimated Budget"),
        "packingList" => Some("Packing List"),
        "weather" => Some("Weather"),
        _ => None,
    };
    if let Some(title) = exact {
        return title.to_string();
    }

    let k = key.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| k.contains(n));
    if contains_any(&["hotel", "accom", "stay"]) {
        "Hotels".to_string()
    } else if contains_any(&["restaurant", "food", "eat", "dine"]) {
        "Restaurants".to_string()
    } else if contains_any(&["event", "ticket"]) {
        "Local Events".to_string()
    } else if contains_any(&["sight", "attraction", "poi", "landmark"]) {
        "Attractions".to_string()
    } else if contains_any(&["itinerary", "day"]) {
        ITINERARY_TITLE.to_string()
    } else {
        key.replace(['_', '-'], " ")
    }
}

/// Fallback card title for items of a section that carry no name.
pub fn default_item_title(section_key: &str) -> &'static str {
    if section_key == "weather" {
        return "Weather";
    }
    let k = section_key.to_lowercase();
    let contains_any = |needles: &[&str]| needles.iter().any(|n| k.contains(n));
    if contains_any(&["hotel", "accom", "stay"]) {
        "Hotel"
    } else if contains_any(&["meal"]) {
        "Meal"
    } else if contains_any(&["restaurant", "food", "eat", "dine"]) {
        "Restaurant"
    } else if contains_any(&["event", "ticket"]) {
        "Event"
    } else if contains_any(&["sight", "attraction", "poi", "landmark"]) {
        "Attraction"
    } else if contains_any(&["activity", "activities"]) {
        "Activity"
    } else if contains_any(&["highlight"]) {
        "Highlight"
    } else if contains_any(&["budget", "total", "cost"]) {
        "Budget"
    } else {
        "Place"
    }
}

fn section_items(section_key: &str, value: &Value) -> Vec<Item> {
    match value {
        Value::Array(values) => collect_items(values.iter().map(|v| (None, v)), section_key),
        Value::Object(map) if is_record(map) => vec![record_card(map, None, section_key)],
        Value::Object(map) => collect_items(
            map.iter().map(|(label, v)| (Some(label.as_str()), v)),
            section_key,
        ),
        Value::Null => Vec::new(),
        scalar => scalar_text(scalar)
            .map(|text| vec![Item::Text { text }])
            .unwrap_or_default(),
    }
}

fn collect_items<'a>(
    entries: impl Iterator<Item = (Option<&'a str>, &'a Value)>,
    section_key: &str,
) -> Vec<Item> {
    let mut items = Vec::new();
    for (label, value) in entries {
        push_item(&mut items, label, value, section_key);
    }
    items
}

fn push_item(items: &mut Vec<Item>, label: Option<&str>, value: &Value, section_key: &str) {
    match value {
        Value::Null => {}
        Value::Object(map) => items.push(record_card(map, label, section_key)),
        Value::Array(nested) => {
            for inner in nested {
                push_item(items, label, inner, section_key);
            }
        }
        scalar => {
            let Some(text) = scalar_text(scalar) else {
                return;
            };
            match label {
                Some(label) => items.push(Item::Card(Card {
                    title: label.to_string(),
                    description: Some(text),
                    ..Default::default()
                })),
                None => items.push(Item::Text { text }),
            }
        }
    }
}

fn is_record(map: &Map<String, Value>) -> bool {
    RECORD_MARKERS
        .iter()
        .flat_map(|keys| keys.iter())
        .any(|key| map.get(*key).map(|v| !v.is_null()).unwrap_or(false))
}

fn record_card(map: &Map<String, Value>, label: Option<&str>, section_key: &str) -> Item {
    let default_title = default_item_title(section_key);
    let title = pick(map, TITLE_KEYS)
        .or_else(|| label.map(str::to_string))
        .unwrap_or_else(|| default_title.to_string());

    let mut details = detail_lines(map);
    if details.is_empty() && default_title == "Budget" {
        details = map
            .iter()
            .filter(|(key, _)| !PRICE_KEYS.contains(&key.as_str()))
            .filter_map(|(key, v)| scalar_text(v).map(|text| format!("{}: {}", key, text)))
            .collect();
    }

    Item::Card(Card {
        title,
        subtitle: pick(map, SUBTITLE_KEYS),
        description: pick(map, DESCRIPTION_KEYS),
        rating: pick(map, RATING_KEYS),
        price: pick(map, PRICE_KEYS),
        category: pick(map, CATEGORY_KEYS),
        time: pick(map, TIME_KEYS),
        image: pick(map, IMAGE_KEYS),
        details,
    })
}

fn detail_lines(map: &Map<String, Value>) -> Vec<String> {
    let mut lines = Vec::new();
    for key in DETAIL_KEYS {
        match map.get(*key) {
            Some(Value::Array(values)) => lines.extend(values.iter().filter_map(|v| match v {
                Value::Object(inner) => pick(inner, TITLE_KEYS),
                other => scalar_text(other),
            })),
            Some(Value::Object(inner)) => lines.extend(
                inner
                    .iter()
                    .filter_map(|(k, v)| scalar_text(v).map(|text| format!("{}: {}", k, text))),
            ),
            Some(other) => lines.extend(scalar_text(other)),
            None => {}
        }
    }
    lines
}

fn itinerary_items(value: &Value) -> Vec<Item> {
    match value {
        Value::Array(days) => days
            .iter()
            .enumerate()
            .filter(|(_, day)| !day.is_null())
            .map(|(idx, day)| Item::Day(day_plan(None, day, idx)))
            .collect(),
        Value::Object(map) if looks_like_single_day(map) => {
            vec![Item::Day(day_plan(None, value, 0))]
        }
        Value::Object(map) => map
            .iter()
            .enumerate()
            .filter(|(_, (_, day))| !day.is_null())
            .map(|(idx, (label, day))| Item::Day(day_plan(Some(label), day, idx)))
            .collect(),
        Value::Null => Vec::new(),
        scalar => scalar_text(scalar)
            .map(|text| vec![Item::Text { text }])
            .unwrap_or_default(),
    }
}

fn looks_like_single_day(map: &Map<String, Value>) -> bool {
    map.contains_key("day") || ACTIVITY_LIST_KEYS.iter().any(|k| map.contains_key(*k))
}

fn day_plan(label: Option<&str>, value: &Value, idx: usize) -> DayPlan {
    let fallback = || format!("Day {}", idx + 1);
    match value {
        Value::Object(map) => {
            let title = day_title(map)
                .or_else(|| label.map(str::to_string))
                .unwrap_or_else(fallback);
            let date = pick(map, &["date"]);

            let lines = match ACTIVITY_LIST_KEYS.iter().find_map(|k| map.get(*k)) {
                Some(activities) => activity_lines(None, activities),
                // Time-slotted day: { morning: {...}, afternoon: {...} }
                None => map
                    .iter()
                    .filter(|(k, _)| !DAY_META_KEYS.contains(&k.as_str()))
                    .flat_map(|(slot, v)| activity_lines(Some(slot), v))
                    .collect(),
            };
            DayPlan { title, date, lines }
        }
        other => DayPlan {
            title: label.map(str::to_string).unwrap_or_else(fallback),
            date: None,
            lines: activity_lines(None, other),
        },
    }
}

fn day_title(map: &Map<String, Value>) -> Option<String> {
    match map.get("day") {
        Some(Value::Number(n)) => Some(format!("Day {}", number_text(n))),
        Some(other) => scalar_text(other),
        None => None,
    }
    .or_else(|| pick(map, &["title", "label", "name"]))
}

fn activity_lines(slot: Option<&str>, value: &Value) -> Vec<String> {
    match value {
        Value::Array(values) => values
            .iter()
            .flat_map(|v| activity_lines(slot, v))
            .collect(),
        Value::Object(map) if map.keys().all(|k| is_slot_like(map, k)) && !map.is_empty() => map
            .iter()
            .flat_map(|(inner_slot, v)| activity_lines(Some(inner_slot), v))
            .collect(),
        Value::Object(map) => vec![activity_line(slot, map)],
        Value::Null => Vec::new(),
        scalar => scalar_text(scalar)
            .map(|text| match slot {
                Some(slot) => format!("{}: {}", slot, text),
                None => text,
            })
            .into_iter()
            .collect(),
    }
}

// An object whose every value is itself an object or list is a set of time
// slots, not an activity.
fn is_slot_like(map: &Map<String, Value>, key: &str) -> bool {
    matches!(map.get(key), Some(Value::Object(_)) | Some(Value::Array(_)))
}

pub fn activity_line(slot: Option<&str>, activity: &Map<String, Value>) -> String {
    let time = pick(activity, TIME_KEYS).or_else(|| slot.map(str::to_string));
    let place = pick(activity, ACTIVITY_PLACE_KEYS);
    let text = pick(activity, ACTIVITY_TEXT_KEYS)
        .or_else(|| place.clone())
        .unwrap_or_else(|| "Activity".to_string());

    let mut line = match time {
        Some(time) => format!("{}: {}", time, text),
        None => text.clone(),
    };
    if let Some(place) = place.filter(|p| *p != text) {
        line.push_str(&format!(" at {}", place));
    }
    if let Some(cost) = pick(activity, TRANSPORT_COST_KEYS) {
        line.push_str(&format!(" (Transport: ₹{})", cost));
    }
    line
}

/// First key whose value is a non-empty scalar, rendered as text.
pub fn pick(map: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| map.get(*k).and_then(scalar_text))
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(number_text(n)),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_text(n: &serde_json::Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(item: &Item) -> &Card {
        match item {
            Item::Card(card) => card,
            other => panic!("expected card, got {:?}", other),
        }
    }

    fn day(item: &Item) -> &DayPlan {
        match item {
            Item::Day(day) => day,
            other => panic!("expected day, got {:?}", other),
        }
    }

    #[test]
    fn test_itinerary_array_of_days() {
        let sections = to_sections(&json!({
            "itinerary": [{
                "day": "Day 1",
                "date": "2024-05-10",
                "activities": [{ "time": "9am", "description": "Arrive" }]
            }]
        }));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Itinerary");
        assert_eq!(sections[0].items.len(), 1);

        let d = day(&sections[0].items[0]);
        assert_eq!(d.title, "Day 1");
        assert_eq!(d.date.as_deref(), Some("2024-05-10"));
        assert_eq!(d.lines.len(), 1);
        assert!(d.lines[0].contains("Arrive"));
        assert_eq!(d.lines[0], "9am: Arrive");
    }

    #[test]
    fn test_hotel_without_title_falls_back() {
        let sections = to_sections(&json!({ "hotels": [{ "totalCost": 4200, "type": "Budget" }] }));
        let c = card(&sections[0].items[0]);
        assert_eq!(sections[0].title, "Hotels");
        assert_eq!(c.title, "Hotel");
        assert_eq!(c.price.as_deref(), Some("4200"));
        assert_eq!(c.category.as_deref(), Some("Budget"));
    }

    #[test]
    fn test_full_generation_payload() {
        let sections = to_sections(&json!({
            "hotels": [
                { "name": "Zostel", "type": "Hostel", "location": "MI Road", "totalCost": 3000, "features": ["Wifi", "Rooftop"] }
            ],
            "meals": {
                "breakfast": { "cuisineType": "Rajasthani", "famousDish": "Pyaaz Kachori", "minCost": 80, "recommendedRestaurants": ["Rawat"] }
            },
            "itinerary": { "Day 1": { "morning": { "place": "Amber Fort", "minTransportCost": 150 } } },
            "estimatedTotal": { "breakdown": { "hotels": 9000, "meals": 4000 }, "total": 20000 },
            "packingList": ["Sunscreen", "Scarf"]
        }));

        let titles: Vec<&str> = sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Hotels", "Meals", "Itinerary", "Estimated Budget", "Packing List"]
        );

        let hotel = card(&sections[0].items[0]);
        assert_eq!(hotel.title, "Zostel");
        assert_eq!(hotel.subtitle.as_deref(), Some("MI Road"));
        assert_eq!(hotel.details, vec!["Wifi", "Rooftop"]);

        let breakfast = card(&sections[1].items[0]);
        assert_eq!(breakfast.title, "breakfast");
        assert_eq!(breakfast.description.as_deref(), Some("Pyaaz Kachori"));
        assert_eq!(breakfast.price.as_deref(), Some("80"));
        assert_eq!(breakfast.category.as_deref(), Some("Rajasthani"));
        assert_eq!(breakfast.details, vec!["Rawat"]);

        let d = day(&sections[2].items[0]);
        assert_eq!(d.title, "Day 1");
        assert_eq!(d.lines, vec!["morning: Amber Fort (Transport: ₹150)"]);

        let budget = card(&sections[3].items[0]);
        assert_eq!(budget.title, "Budget");
        assert_eq!(budget.price.as_deref(), Some("20000"));
        assert_eq!(budget.details, vec!["hotels: 9000", "meals: 4000"]);

        assert_eq!(
            sections[4].items,
            vec![
                Item::Text { text: "Sunscreen".into() },
                Item::Text { text: "Scarf".into() }
            ]
        );
    }

    #[test]
    fn test_activity_line_parts() {
        let map = json!({ "time": "10:00", "description": "Fort tour", "place": "Amber Fort", "minTransportCost": 200 });
        let line = activity_line(None, map.as_object().unwrap());
        assert_eq!(line, "10:00: Fort tour at Amber Fort (Transport: ₹200)");

        let bare = json!({ "rating": 4 });
        assert_eq!(activity_line(None, bare.as_object().unwrap()), "Activity");
    }

    #[test]
    fn test_day_titles_fall_back_to_position() {
        let sections = to_sections(&json!({
            "itinerary": [
                { "activities": ["Check in"] },
                { "day": 2, "activities": [] },
                "Free day"
            ]
        }));
        let items = &sections[0].items;
        assert_eq!(day(&items[0]).title, "Day 1");
        assert_eq!(day(&items[0]).lines, vec!["Check in"]);
        assert_eq!(day(&items[1]).title, "Day 2");
        assert!(day(&items[1]).lines.is_empty());
        assert_eq!(day(&items[2]).title, "Day 3");
        assert_eq!(day(&items[2]).lines, vec!["Free day"]);
    }

    #[test]
    fn test_object_of_day_arrays() {
        let sections = to_sections(&json!({
            "itinerary": { "Day 1": [{ "time": "8am", "name": "Breakfast" }, "Walk"] }
        }));
        let d = day(&sections[0].items[0]);
        assert_eq!(d.title, "Day 1");
        assert_eq!(d.lines, vec!["8am: Breakfast", "Walk"]);
    }

    #[test]
    fn test_array_input_is_highlights() {
        let sections = to_sections(&json!([{ "name": "Hawa Mahal" }, "Bazaar"]));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].key, "highlights");
        assert_eq!(sections[0].title, "Highlights");
        assert_eq!(card(&sections[0].items[0]).title, "Hawa Mahal");
        assert_eq!(sections[0].items[1], Item::Text { text: "Bazaar".into() });
    }

    #[test]
    fn test_string_input_matches_parsed_value() {
        let value = json!({ "hotels": [{ "name": "A" }], "events": [{ "title": "Fest" }] });
        let as_text = serde_json::to_string(&value).unwrap();
        assert_eq!(to_sections(&Value::String(as_text.clone())), to_sections(&value));

        let fenced = format!("```json\n{}\n```", as_text);
        assert_eq!(to_sections(&Value::String(fenced)), to_sections(&value));
    }

    #[test]
    fn test_unparseable_string_becomes_text_section() {
        let sections = to_sections(&json!("Sorry, I cannot help with that"));
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].title, "Highlights");
        assert_eq!(
            sections[0].items,
            vec![Item::Text { text: "Sorry, I cannot help with that".into() }]
        );
    }

    #[test]
    fn test_empty_inputs_give_no_sections() {
        assert!(to_sections(&Value::Null).is_empty());
        assert!(to_sections(&json!("   ")).is_empty());
        assert!(to_sections(&json!({})).is_empty());
        assert_eq!(to_sections(&json!({ "hotels": null, "weather": "Sunny" })).len(), 1);
    }

    #[test]
    fn test_title_resolution() {
        assert_eq!(section_title("accommodations"), "Hotels");
        assert_eq!(section_title("pointsOfInterest"), "Points of Interest");
        assert_eq!(section_title("luxuryHotelsNearby"), "Hotels");
        assert_eq!(section_title("street_food"), "Restaurants");
        assert_eq!(section_title("ticketed-shows"), "Local Events");
        assert_eq!(section_title("Landmarks"), "Attractions");
        assert_eq!(section_title("dayPlan"), "Itinerary");
        assert_eq!(section_title("travel_tips"), "travel tips");
        assert_eq!(section_title("local-transport"), "local transport");
    }

    #[test]
    fn test_labeled_collection_uses_labels() {
        let sections = to_sections(&json!({
            "restaurants": { "Cafe Rose": { "cuisine": "Italian" }, "Budget pick": "Thali house" }
        }));
        let items = &sections[0].items;
        assert_eq!(card(&items[0]).title, "Cafe Rose");
        assert_eq!(card(&items[0]).category.as_deref(), Some("Italian"));
        assert_eq!(card(&items[1]).title, "Budget pick");
        assert_eq!(card(&items[1]).description.as_deref(), Some("Thali house"));
    }

    #[test]
    fn test_single_record_section() {
        let sections = to_sections(&json!({ "weather": { "summary": "Warm and dry", "temperature": 31 } }));
        assert_eq!(sections[0].items.len(), 1);
        let c = card(&sections[0].items[0]);
        assert_eq!(c.title, "Weather");
        assert_eq!(c.description.as_deref(), Some("Warm and dry"));
    }

    #[test]
    fn test_odd_shapes_do_not_panic() {
        let inputs = vec![
            json!(42),
            json!(true),
            json!({ "itinerary": 5 }),
            json!({ "itinerary": [null, [], {}] }),
            json!({ "hotels": [[[{ "name": "Deep" }]]] }),
            json!({ "hotels": { "": null } }),
            json!({ "x": { "y": { "z": [1, { "price": 1.5 }] } } }),
        ];
        for input in inputs {
            let _ = to_sections(&input);
        }
        let nested = to_sections(&json!({ "hotels": [[{ "name": "Deep" }]] }));
        assert_eq!(card(&nested[0].items[0]).title, "Deep");
    }

    #[test]
    fn test_whole_floats_render_without_fraction() {
        let sections = to_sections(&json!({ "hotels": [{ "name": "A", "price": 2500.0, "rating": 4.5 }] }));
        let c = card(&sections[0].items[0]);
        assert_eq!(c.price.as_deref(), Some("2500"));
        assert_eq!(c.rating.as_deref(), Some("4.5"));
    }
}
