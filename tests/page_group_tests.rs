//! Page group planning as the runner sees it
use smartstore_relister_lib::CrawlerSettings;
use smartstore_relister_lib::domain::pagination::{PageGroup, parse_page_list, plan_page_groups};

fn bounds(groups: &[PageGroup]) -> Vec<(u32, u32)> {
    groups.iter().map(|g| (g.start, g.last)).collect()
}

#[test]
fn full_range_splits_into_tens() {
    let groups = plan_page_groups(1, 23, None);
    assert_eq!(bounds(&groups), vec![(1, 10), (11, 20), (21, 23)]);
    assert_eq!(groups[2].targets, vec![21, 22, 23]);
    assert_eq!(groups[0].first_target(), Some(1));
}

#[test]
fn only_pages_collapse_the_range_and_drop_empty_groups() {
    let only = parse_page_list("3; 25").unwrap();
    let groups = plan_page_groups(1, 40, Some(&only));
    assert_eq!(bounds(&groups), vec![(3, 12), (23, 25)]);
    assert_eq!(groups[0].targets, vec![3]);
    assert_eq!(groups[1].targets, vec![25]);
}

#[test]
fn invalid_ranges_plan_nothing() {
    assert!(plan_page_groups(0, 5, None).is_empty());
    assert!(plan_page_groups(6, 5, None).is_empty());
}

#[test]
fn settings_feed_the_planner() {
    let vars = [
        ("START_PAGE", "5"),
        ("LAST_PAGE", "18"),
        ("CRAWL_ONLY_PAGES", "7, 16"),
    ]
    .map(|(k, v)| (k.to_string(), v.to_string()));
    let settings = CrawlerSettings::load_from(None, vars).unwrap();
    let only = settings.only_pages();
    let groups = plan_page_groups(settings.start_page, settings.last_page, only.as_ref());
    assert_eq!(bounds(&groups), vec![(7, 16)]);
    assert_eq!(groups[0].targets, vec![7, 16]);
}

#[test]
fn page_lists_reject_garbage() {
    assert_eq!(parse_page_list("3, 7;9 12").unwrap().len(), 4);
    assert!(parse_page_list("3, x").is_none());
    assert!(parse_page_list(" , ").is_none());
}
