//! Delaware Division of Professional Regulation, master plumbers.

use crate::record::{NormalizedRecord, RawRecord};
use crate::scrape::DetailPolicy;
use crate::targets::mylicense::MyLicenseSite;

pub static SITE: MyLicenseSite = MyLicenseSite {
    name: "delaware",
    search_url: "https://dpronline.delaware.gov/mylicense%20weblookup/Search.aspx",
    profession: Some("Plumbing/HVACR"),
    license_type: Some("Master Plumber"),
    row_keys: &["Name", "License", "Profession", "Type", "Status"],
    identity: &["Name", "License", "Profession", "Type", "Status"],
    page_limit: 48,
    detail_fields: &[
        ("_ctl21__ctl1_issue_date", "Issue"),
        ("_ctl21__ctl1_expiration_date", "Expiration"),
        ("_ctl26__ctl1_addr_city", "City"),
        ("_ctl26__ctl1_addr_state", "State"),
        ("_ctl26__ctl1_addr_zipcode", "Zip"),
        ("_ctl26__ctl1_addr_country", "Country"),
    ],
    detail_policy: DetailPolicy::Abort,
    extra_columns: &[
        "License Type",
        "Profession",
        "Full Name",
        "Issue Date",
        "Expiration Date",
    ],
    format,
};

fn format(record: &RawRecord, out: &mut NormalizedRecord) {
    let state = Some(record.field("State"))
        .filter(|s| !s.is_empty())
        .unwrap_or("Delaware");
    out.set("City", record.field("City"));
    out.set("State", state);
    out.set("Zip Code", record.field("Zip"));
    out.set("License Type", record.field("Type"));
    out.set("Profession", record.field("Profession"));
    out.set("Full Name", record.field("Name"));
    out.set("Issue Date", record.field("Issue"));
    out.set("Expiration Date", record.field("Expiration"));
}

#[cfg(test)]
mod tests {
    use url::Url;

    use crate::record::HREF;
    use crate::scrape::Target;
    use crate::targets::mylicense::MyLicense;
    use crate::transport::Page;

    use super::*;

    #[test]
    fn detail_fields_by_id() {
        let target = MyLicense::new(&SITE);
        let page = Page {
            url: Url::parse("https://dpronline.delaware.gov/mylicense%20weblookup/Details.aspx").unwrap(),
            body: r#"<table>
                <tr><td>Issue Date</td><td><span id="_ctl21__ctl1_issue_date">03/14/1998</span></td></tr>
                <tr><td>Expiration</td><td><span id="_ctl21__ctl1_expiration_date">06/30/2026</span></td></tr>
                <tr><td><span id="_ctl26__ctl1_addr_city">DOVER</span>
                    <span id="_ctl26__ctl1_addr_state">DE</span>
                    <span id="_ctl26__ctl1_addr_zipcode">19901</span></td></tr>
            </table>"#
                .to_string(),
        };
        let mut record = RawRecord::zip(SITE.row_keys, ["SMITH, JOHN", "PL-1", "Plumbing/HVACR", "Master Plumber", "Active"]);
        record.insert(HREF, page.url.to_string());

        let detail = target.parse_detail(&page).unwrap();
        assert_eq!(detail.get("Issue"), Some("03/14/1998"));
        assert_eq!(detail.get("Zip"), Some("19901"));
        assert!(!detail.contains("Country"));

        record.merge_missing(detail);
        let out = target.format_record(&record);
        assert_eq!(out.get("Last Name"), Some("SMITH"));
        assert_eq!(out.get("First Name"), Some("JOHN"));
        assert_eq!(out.get("State"), Some("DE"));
        assert_eq!(out.get("City"), Some("DOVER"));
        assert_eq!(out.get("License Number"), Some("PL-1"));
        assert_eq!(out.get("Expiration Date"), Some("06/30/2026"));
    }

    #[test]
    fn state_falls_back_to_delaware() {
        let target = MyLicense::new(&SITE);
        let record = RawRecord::zip(&["Name", "License"], ["DOE, JANE", "PL-2"]);
        let out = target.format_record(&record);
        assert_eq!(out.get("State"), Some("Delaware"));
        assert_eq!(out.get("Issue Date"), Some(""));
    }
}
