//! Synthetic catalog trees with known shape.
//!
//! Each generator returns `(url, document)` pairs ready for
//! [`MockFetcher::with_documents`](crate::MockFetcher::with_documents).
//! All trees live under [`CATALOG_BASE`](crate::fixtures::CATALOG_BASE) and
//! use `./` relative links throughout, the way static catalogs publish them.

use serde_json::Value;

use crate::fixtures::{bbox, catalog, stac_item, time, CATALOG_BASE};

pub type Documents = Vec<(String, Value)>;

pub fn root_url() -> String {
    format!("{}/catalog.json", CATALOG_BASE)
}

/// Root with two branches `A` and `B`, each holding a single item.
///
/// A's item covers [`bbox::NEAR_LEAF`], B's item covers [`bbox::FAR_LEAF`].
pub fn two_branch_catalog() -> Documents {
    let root = root_url();
    vec![
        (
            root.clone(),
            catalog(
                "root",
                &[
                    ("self", root.as_str(), None),
                    ("child", "./a/catalog.json", Some("A")),
                    ("child", "./b/catalog.json", Some("B")),
                ],
            ),
        ),
        (
            format!("{}/a/catalog.json", CATALOG_BASE),
            catalog("a", &[("item", "./near.json", None)]),
        ),
        (
            format!("{}/b/catalog.json", CATALOG_BASE),
            catalog("b", &[("item", "./far.json", None)]),
        ),
        (
            format!("{}/a/near.json", CATALOG_BASE),
            stac_item("near", bbox::NEAR_LEAF, Some(time::REFERENCE_TIME)),
        ),
        (
            format!("{}/b/far.json", CATALOG_BASE),
            stac_item("far", bbox::FAR_LEAF, Some(time::REFERENCE_TIME)),
        ),
    ]
}

/// URL of the catalog node at `depth` in [`chain_catalog`].
pub fn chain_node_url(depth: usize) -> String {
    let mut url = CATALOG_BASE.to_string();
    for level in 1..=depth {
        url.push_str(&format!("/l{}", level));
    }
    format!("{}/catalog.json", url)
}

/// A single chain of catalogs `depth` levels below the root.
///
/// Every level carries one item (`item-<level>`) and, except the last, one
/// child pointing a level deeper.
pub fn chain_catalog(depth: usize) -> Documents {
    let mut docs = Vec::new();
    for level in 0..=depth {
        let url = chain_node_url(level);
        let item_href = format!("./item-{}.json", level);
        let child_href = format!("./l{}/catalog.json", level + 1);

        let mut links: Vec<(&str, &str, Option<&str>)> = vec![("item", item_href.as_str(), None)];
        if level < depth {
            links.push(("child", child_href.as_str(), None));
        }
        docs.push((url.clone(), catalog(&format!("level-{}", level), &links)));

        let item_url = url.replace("catalog.json", &format!("item-{}.json", level));
        docs.push((
            item_url,
            stac_item(&format!("item-{}", level), bbox::NEAR_LEAF, Some(time::REFERENCE_TIME)),
        ));
    }
    docs
}

/// Root with `children` collections of `items_per_child` items each.
///
/// Items are named `c<child>-<n>` and all cover [`bbox::NEAR_LEAF`].
pub fn wide_catalog(children: usize, items_per_child: usize) -> Documents {
    let child_hrefs: Vec<String> = (0..children)
        .map(|c| format!("./c{}/collection.json", c))
        .collect();
    let root_links: Vec<(&str, &str, Option<&str>)> = child_hrefs
        .iter()
        .map(|href| ("child", href.as_str(), None))
        .collect();

    let mut docs = vec![(root_url(), catalog("root", &root_links))];
    for c in 0..children {
        let item_hrefs: Vec<String> = (0..items_per_child)
            .map(|n| format!("./c{}-{}.json", c, n))
            .collect();
        let links: Vec<(&str, &str, Option<&str>)> = item_hrefs
            .iter()
            .map(|href| ("item", href.as_str(), None))
            .collect();
        docs.push((
            format!("{}/c{}/collection.json", CATALOG_BASE, c),
            catalog(&format!("c{}", c), &links),
        ));
        for n in 0..items_per_child {
            docs.push((
                format!("{}/c{}/c{}-{}.json", CATALOG_BASE, c, c, n),
                stac_item(&format!("c{}-{}", c, n), bbox::NEAR_LEAF, Some(time::REFERENCE_TIME)),
            ));
        }
    }
    docs
}

/// Year → month → day → item tree.
///
/// Years `2023` and `2024`; 2023 has months `2023-01` and `2023-02`, 2024
/// has `2024-03`. Each month has one day (`05`) with one item named
/// `<month>-item`, acquired on the 5th.
pub fn dated_catalog() -> Documents {
    let layout: [(&str, &[&str]); 2] = [("2023", &["01", "02"]), ("2024", &["03"])];

    let mut docs = vec![(
        root_url(),
        catalog(
            "root",
            &[
                ("child", "./2023/catalog.json", Some("2023")),
                ("child", "./2024/catalog.json", Some("2024")),
            ],
        ),
    )];

    for (year, months) in layout {
        let month_hrefs: Vec<(String, String)> = months
            .iter()
            .map(|m| (format!("./{}/catalog.json", m), format!("{}-{}", year, m)))
            .collect();
        let links: Vec<(&str, &str, Option<&str>)> = month_hrefs
            .iter()
            .map(|(href, title)| ("child", href.as_str(), Some(title.as_str())))
            .collect();
        docs.push((
            format!("{}/{}/catalog.json", CATALOG_BASE, year),
            catalog(year, &links),
        ));

        for month in months.iter() {
            let month_id = format!("{}-{}", year, month);
            docs.push((
                format!("{}/{}/{}/catalog.json", CATALOG_BASE, year, month),
                catalog(&month_id, &[("child", "./05/catalog.json", Some("05"))]),
            ));
            docs.push((
                format!("{}/{}/{}/05/catalog.json", CATALOG_BASE, year, month),
                catalog(&format!("{}-05", month_id), &[("item", "./item.json", None)]),
            ));
            docs.push((
                format!("{}/{}/{}/05/item.json", CATALOG_BASE, year, month),
                stac_item(
                    &format!("{}-item", month_id),
                    bbox::NEAR_LEAF,
                    Some(format!("{}-05T10:00:00Z", month_id).as_str()),
                ),
            ));
        }
    }
    docs
}

/// Root → organisation catalogs → group catalogs → items.
///
/// Organisations are `by-product-type` (groups `GEO`, `SLC`) and
/// `by-instrument-mode` (groups `spotlight`, `stripmap`). Items are named
/// `<group>-item`.
pub fn organised_catalog() -> Documents {
    let orgs: [(&str, &str, &[&str]); 2] = [
        ("by-product-type", "Open Data by Product Type", &["GEO", "SLC"]),
        ("by-instrument-mode", "Open Data by Instrument Mode", &["spotlight", "stripmap"]),
    ];

    let org_hrefs: Vec<String> = orgs
        .iter()
        .map(|(slug, _, _)| format!("./open-data-{}/catalog.json", slug))
        .collect();
    let root_links: Vec<(&str, &str, Option<&str>)> = org_hrefs
        .iter()
        .zip(orgs.iter())
        .map(|(href, (_, title, _))| ("child", href.as_str(), Some(*title)))
        .collect();
    let mut docs = vec![(root_url(), catalog("root", &root_links))];

    for (slug, _, groups) in orgs {
        let group_hrefs: Vec<(String, String)> = groups
            .iter()
            .map(|g| (format!("./{}/collection.json", g.to_lowercase()), g.to_string()))
            .collect();
        let links: Vec<(&str, &str, Option<&str>)> = group_hrefs
            .iter()
            .map(|(href, title)| ("child", href.as_str(), Some(title.as_str())))
            .collect();
        docs.push((
            format!("{}/open-data-{}/catalog.json", CATALOG_BASE, slug),
            catalog(slug, &links),
        ));

        for group in groups.iter() {
            let dir = format!("{}/open-data-{}/{}", CATALOG_BASE, slug, group.to_lowercase());
            docs.push((
                format!("{}/collection.json", dir),
                catalog(group, &[("item", "./item.json", None)]),
            ));
            docs.push((
                format!("{}/item.json", dir),
                stac_item(&format!("{}-item", group), bbox::NEAR_LEAF, Some(time::REFERENCE_TIME)),
            ));
        }
    }
    docs
}
