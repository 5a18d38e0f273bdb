//! Display-ready campaign data. Pure functions only.
//!
//! Decisions (goal reached, ownership) are made on exact wei amounts; the
//! decimal strings produced here are for rendering and nothing else.

use alloy_primitives::utils::format_ether;
use fd_types::{Address, Campaign, NetworkStatus, TargetNetwork, U256};
use serde::Serialize;

const BASIS_POINTS: u64 = 10_000;

pub fn goal_reached(goal: U256, raised: U256) -> bool {
    raised >= goal
}

/// Funded share of the goal in percent, unclamped (overfunded campaigns go
/// past 100). A zero goal counts as fully funded.
pub fn funding_percent(goal: U256, raised: U256) -> f64 {
    if goal.is_zero() {
        return 100.0;
    }
    let scale = U256::from(BASIS_POINTS);
    let basis_points = match raised.checked_mul(scale) {
        Some(scaled) => scaled / goal,
        // Amounts near the top of the range: scale the goal down instead.
        None => match goal / scale {
            unit if unit.is_zero() => U256::MAX,
            unit => raised / unit,
        },
    };
    u64::try_from(basis_points).map_or(f64::MAX, |bp| bp as f64) / 100.0
}

/// Progress bar width, always within `[0, 100]`.
pub fn progress_percent(goal: U256, raised: U256) -> f64 {
    funding_percent(goal, raised).clamp(0.0, 100.0)
}

/// Address equality is byte equality, so differently cased hex spellings of
/// the same account compare equal once parsed.
pub fn is_owner(account: Option<&Address>, owner: &Address) -> bool {
    account.is_some_and(|account| account == owner)
}

/// `0x1234...abcd`
pub fn short_address(address: &Address) -> String {
    let full = address.to_string();
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Wei to a trimmed ether string: `1500000000000000000` → `1.5`.
pub fn format_amount(wei: U256) -> String {
    let formatted = format_ether(wei);
    match formatted.split_once('.') {
        Some((whole, fraction)) => {
            let fraction = fraction.trim_end_matches('0');
            if fraction.is_empty() {
                format!("{whole}.0")
            } else {
                format!("{whole}.{fraction}")
            }
        }
        None => format!("{formatted}.0"),
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardAction {
    /// Funds already withdrawn.
    Completed,
    Withdraw { enabled: bool },
    Fund,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CampaignView {
    pub id: u64,
    pub owner: Address,
    pub owner_short: String,
    pub title: String,
    pub description: String,
    pub goal: String,
    pub raised: String,
    pub progress_percent: f64,
    pub progress_label: String,
    pub goal_reached: bool,
    pub is_owner: bool,
    pub action: CardAction,
}

pub fn project(campaign: &Campaign, account: Option<&Address>) -> CampaignView {
    let reached = goal_reached(campaign.goal, campaign.funds_raised);
    let owner = is_owner(account, &campaign.owner);
    let action = if campaign.completed {
        CardAction::Completed
    } else if owner {
        CardAction::Withdraw { enabled: reached }
    } else {
        CardAction::Fund
    };

    CampaignView {
        id: campaign.id,
        owner: campaign.owner,
        owner_short: short_address(&campaign.owner),
        title: campaign.title.clone(),
        description: campaign.description.clone(),
        goal: format_amount(campaign.goal),
        raised: format_amount(campaign.funds_raised),
        progress_percent: progress_percent(campaign.goal, campaign.funds_raised),
        progress_label: format!("{:.2}%", funding_percent(campaign.goal, campaign.funds_raised)),
        goal_reached: reached,
        is_owner: owner,
        action,
    }
}

pub fn project_all(campaigns: &[Campaign], account: Option<&Address>) -> Vec<CampaignView> {
    campaigns
        .iter()
        .map(|campaign| project(campaign, account))
        .collect()
}

/// Cards for the campaigns `account` owns, newest first like the input.
pub fn project_owned(campaigns: &[Campaign], account: &Address) -> Vec<CampaignView> {
    campaigns
        .iter()
        .filter(|campaign| &campaign.owner == account)
        .map(|campaign| project(campaign, Some(account)))
        .collect()
}

pub fn network_label(status: NetworkStatus, target: &TargetNetwork) -> String {
    match status {
        NetworkStatus::Correct => format!("{} Network", target.short_name),
        NetworkStatus::Incorrect => "Wrong Network".to_owned(),
        NetworkStatus::Unknown => "Checking Network".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(n: u128) -> U256 {
        U256::from(n)
    }

    const ETH: u128 = 1_000_000_000_000_000_000;
    const ALICE: &str = "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed";
    const BOB: &str = "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359";

    fn campaign(owner: &str, goal: u128, raised: u128, completed: bool) -> Campaign {
        Campaign {
            id: 1,
            owner: owner.parse().unwrap(),
            title: "Clinic".to_owned(),
            description: "Equipment".to_owned(),
            goal: wei(goal),
            funds_raised: wei(raised),
            completed,
        }
    }

    #[test]
    fn goal_reached_uses_exact_amounts() {
        assert!(!goal_reached(wei(ETH), wei(ETH / 2)));
        assert!(goal_reached(wei(2 * ETH), wei(2 * ETH)));
        // One wei short renders as "1.0" but is not reached.
        assert!(!goal_reached(wei(ETH), wei(ETH - 1)));
        assert!(goal_reached(wei(ETH), wei(ETH + 1)));
        for (goal, raised) in [(1, 0), (1, 1), (7, 3), (3, 7), (ETH, u128::MAX)] {
            assert_eq!(goal_reached(wei(goal), wei(raised)), raised >= goal);
        }
    }

    #[test]
    fn progress_is_monotonic_and_clamped() {
        let goal = wei(3 * ETH);
        let mut previous = 0.0;
        for step in 0..=40u128 {
            let raised = wei(step * ETH / 4);
            let progress = progress_percent(goal, raised);
            assert!(progress >= previous);
            assert!((0.0..=100.0).contains(&progress));
            previous = progress;
        }
        assert_eq!(progress_percent(goal, wei(u128::MAX)), 100.0);
        assert!(funding_percent(goal, wei(6 * ETH)) > 100.0);
        assert_eq!(progress_percent(U256::ZERO, U256::ZERO), 100.0);
        assert_eq!(progress_percent(goal, U256::MAX), 100.0);
    }

    #[test]
    fn progress_holds_near_the_top_of_the_range() {
        let goal = U256::from(1u8) << 250;
        assert_eq!(funding_percent(goal, goal), 100.0);
        assert_eq!(funding_percent(goal, goal >> 1), 50.0);
        assert!(goal_reached(goal, goal));
        let whale = Campaign {
            goal,
            funds_raised: goal,
            ..campaign(ALICE, 1, 0, false)
        };
        assert_eq!(project(&whale, None).progress_label, "100.00%");
    }

    #[test]
    fn ownership_ignores_hex_case() {
        let mixed: Address = ALICE.parse().unwrap();
        let lower: Address = ALICE.to_lowercase().parse().unwrap();
        let upper: Address = format!("0x{}", ALICE[2..].to_uppercase()).parse().unwrap();
        let bob: Address = BOB.parse().unwrap();

        assert!(is_owner(Some(&lower), &mixed));
        assert!(is_owner(Some(&upper), &lower));
        assert!(!is_owner(Some(&bob), &mixed));
        assert!(!is_owner(None, &mixed));
    }

    #[test]
    fn amounts_render_trimmed() {
        assert_eq!(format_amount(wei(ETH)), "1.0");
        assert_eq!(format_amount(wei(ETH + ETH / 2)), "1.5");
        assert_eq!(format_amount(U256::ZERO), "0.0");
        assert_eq!(format_amount(wei(1)), "0.000000000000000001");
    }

    #[test]
    fn card_actions_follow_state() {
        let alice: Address = ALICE.parse().unwrap();
        let bob: Address = BOB.parse().unwrap();

        let open = campaign(ALICE, ETH, ETH / 2, false);
        assert_eq!(project(&open, Some(&bob)).action, CardAction::Fund);
        assert_eq!(
            project(&open, Some(&alice)).action,
            CardAction::Withdraw { enabled: false }
        );
        assert_eq!(project(&open, None).action, CardAction::Fund);

        let done = campaign(ALICE, 2 * ETH, 2 * ETH, true);
        let view = project(&done, Some(&alice));
        assert_eq!(view.action, CardAction::Completed);
        assert!(view.goal_reached);
        assert_eq!(view.raised, "2.0");

        let overfunded = campaign(ALICE, ETH, 3 * ETH, false);
        let view = project(&overfunded, Some(&alice));
        assert_eq!(view.progress_percent, 100.0);
        assert_eq!(view.progress_label, "300.00%");
        assert_eq!(view.action, CardAction::Withdraw { enabled: true });
    }

    #[test]
    fn owned_cards_keep_order() {
        let alice: Address = ALICE.parse().unwrap();
        let campaigns: Vec<Campaign> = [(3, ALICE), (2, BOB), (1, ALICE)]
            .into_iter()
            .map(|(id, owner)| Campaign { id, ..campaign(owner, ETH, 0, false) })
            .collect();

        let owned = project_owned(&campaigns, &alice);
        let ids: Vec<u64> = owned.iter().map(|view| view.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(owned.iter().all(|view| view.is_owner));
        assert_eq!(owned[0].action, CardAction::Withdraw { enabled: false });
    }

    #[test]
    fn short_address_keeps_ends() {
        let alice: Address = ALICE.parse().unwrap();
        assert_eq!(short_address(&alice), "0x5aAe...eAed");
    }

    #[test]
    fn network_labels() {
        let target = TargetNetwork::sepolia();
        assert_eq!(network_label(NetworkStatus::Correct, &target), "Sepolia Network");
        assert_eq!(network_label(NetworkStatus::Incorrect, &target), "Wrong Network");
    }

    #[test]
    fn view_serializes_action_tag() {
        let view = project(&campaign(ALICE, ETH, 0, false), None);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["action"]["kind"], "fund");
        assert_eq!(json["progress_label"], "0.00%");
    }
}
