//! Cart line validation against a menu item's customization groups.
//!
//! A group is *primary* unless some option of the item lists its title in
//! `unlocks_groups`; such *conditional* groups only become visible (and
//! required) once an unlocking option is selected. Every visible group needs
//! at least one selection. Validation walks the groups in their declared
//! order and reports the first failure; selections for titles the item does
//! not declare at all are reported only after every declared group passed.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::entities::menu_item::{CustomizationGroup, SelectionMode};
use crate::services::menu::MenuItemDefinition;

/// A cart line as submitted by the client, after shape validation
#[derive(Clone, Debug, PartialEq)]
pub struct CartLineInput {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    /// Group title to selected option names
    pub selected_options: BTreeMap<String, Vec<String>>,
    /// Unit price the client displayed, kept for mismatch logging only
    pub client_unit_price: Option<Decimal>,
}

/// A cart line that passed validation, priced from the menu
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedLine {
    pub menu_item_id: Uuid,
    pub name: String,
    pub quantity: u32,
    /// Base price plus the additional price of every selected option
    pub unit_price: Decimal,
    /// Only the groups that were visible and selected
    pub selected_options: BTreeMap<String, Vec<String>>,
}

impl ValidatedLine {
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CustomizationErrorKind {
    MissingRequiredGroup,
    InvalidOption,
    TooManySelections,
    UnknownGroup,
}

/// The single failing group (and option) of a cart line
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CustomizationError {
    pub kind: CustomizationErrorKind,
    pub group: String,
    pub option: Option<String>,
    pub item: Option<String>,
}

impl CustomizationError {
    pub fn new(kind: CustomizationErrorKind, group: impl Into<String>, option: Option<String>) -> Self {
        Self {
            kind,
            group: group.into(),
            option,
            item: None,
        }
    }

    pub fn for_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

impl fmt::Display for CustomizationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(item) = &self.item {
            write!(f, "{}: ", item)?;
        }
        match self.kind {
            CustomizationErrorKind::MissingRequiredGroup => {
                write!(f, "please choose an option for '{}'", self.group)
            }
            CustomizationErrorKind::InvalidOption => write!(
                f,
                "'{}' is not a valid choice for '{}'",
                self.option.as_deref().unwrap_or_default(),
                self.group
            ),
            CustomizationErrorKind::TooManySelections => {
                write!(f, "too many options selected for '{}'", self.group)
            }
            CustomizationErrorKind::UnknownGroup => {
                write!(f, "'{}' is not available for this item", self.group)
            }
        }
    }
}

impl std::error::Error for CustomizationError {}

/// Titles of every group that some option of the item can unlock.
fn conditional_titles(groups: &[CustomizationGroup]) -> HashSet<&str> {
    groups
        .iter()
        .flat_map(|g| g.options.iter())
        .flat_map(|o| o.unlocks_groups.iter().map(String::as_str))
        .collect()
}

/// Titles unlocked by the options the customer actually selected.
fn unlocked_titles<'a>(
    groups: &'a [CustomizationGroup],
    selections: &BTreeMap<String, Vec<String>>,
) -> HashSet<&'a str> {
    groups
        .iter()
        .filter_map(|g| selections.get(&g.title).map(|names| (g, names)))
        .flat_map(|(g, names)| names.iter().filter_map(move |n| g.option(n)))
        .flat_map(|o| o.unlocks_groups.iter().map(String::as_str))
        .collect()
}

/// Validates one cart line and recomputes its unit price from the menu.
pub fn validate_line(
    item: &MenuItemDefinition,
    line: &CartLineInput,
) -> Result<ValidatedLine, CustomizationError> {
    let groups = &item.groups;
    let fail = |kind, group: &str, option: Option<&str>| {
        CustomizationError::new(kind, group, option.map(str::to_string)).for_item(&item.name)
    };

    // Non-empty selections only; an empty list is the same as no entry.
    let selections: BTreeMap<String, Vec<String>> = line
        .selected_options
        .iter()
        .filter(|(_, names)| !names.is_empty())
        .map(|(title, names)| (title.clone(), names.clone()))
        .collect();

    let conditional = conditional_titles(groups);
    let unlocked = unlocked_titles(groups, &selections);

    let mut unit_price = item.price;
    let mut accepted = BTreeMap::new();

    for group in groups {
        let visible = !conditional.contains(group.title.as_str())
            || unlocked.contains(group.title.as_str());
        let chosen = selections
            .get(&group.title)
            .map(Vec::as_slice)
            .unwrap_or_default();

        if !visible {
            if !chosen.is_empty() {
                return Err(fail(CustomizationErrorKind::UnknownGroup, &group.title, None));
            }
            continue;
        }

        let mut seen = HashSet::new();
        for name in chosen {
            let option = group
                .option(name)
                .filter(|_| seen.insert(name.as_str()))
                .ok_or_else(|| {
                    fail(
                        CustomizationErrorKind::InvalidOption,
                        &group.title,
                        Some(name),
                    )
                })?;
            unit_price += option.price;
        }

        if chosen.is_empty() {
            // A group without options cannot be satisfied; skip it rather than block the item.
            if group.options.is_empty() {
                continue;
            }
            return Err(fail(
                CustomizationErrorKind::MissingRequiredGroup,
                &group.title,
                None,
            ));
        }

        let limit = match group.selection {
            SelectionMode::Single => 1,
            SelectionMode::Multiple => group.max_selections.max(1) as usize,
        };
        if chosen.len() > limit {
            return Err(fail(
                CustomizationErrorKind::TooManySelections,
                &group.title,
                None,
            ));
        }

        accepted.insert(group.title.clone(), chosen.to_vec());
    }

    // Titles the item does not declare
    if let Some(title) = selections
        .keys()
        .find(|title| !groups.iter().any(|g| &g.title == *title))
    {
        return Err(fail(CustomizationErrorKind::UnknownGroup, title, None));
    }

    Ok(ValidatedLine {
        menu_item_id: item.id,
        name: item.name.clone(),
        quantity: line.quantity,
        unit_price,
        selected_options: accepted,
    })
}
