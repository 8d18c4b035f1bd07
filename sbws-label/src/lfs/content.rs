// Content signals - title, description and channel metadata heuristics

use std::sync::Arc;

use sbws_common::{Record, Vote};

use super::{Category, Field, KeywordVoter, LabelingFunction, SharedLf};

/// Videos below this view count are treated as low-budget productions
pub const SMALL_VIDEO_VIEWS: u64 = 20_000;

/// All content voters in registry order
pub fn all() -> Vec<SharedLf> {
    let mut voters: Vec<SharedLf> = Vec::new();

    voters.push(Arc::new(KeywordVoter {
        name: "sponsor_in_video",
        rationale: "Sponsors pollute videos with less calls",
        category: Category::Content,
        matches: vec![(Field::Desc, "sponsor")],
        hit: Vote::NotCall,
        miss: Vote::Abstain,
    }));
    voters.push(Arc::new(SmallVideo {
        max_views: SMALL_VIDEO_VIEWS,
    }));
    voters.push(Arc::new(KeywordVoter {
        name: "hacking",
        rationale: "Videos about hacking are usually not the call itself",
        category: Category::Content,
        matches: vec![(Field::Desc, "hack")],
        hit: Vote::NotCall,
        miss: Vote::Abstain,
    }));
    voters.push(Arc::new(KeywordVoter {
        name: "live_stream",
        rationale: "Live streams are less likely to be scam calls",
        category: Category::Content,
        matches: vec![(Field::Title, "live")],
        hit: Vote::NotCall,
        miss: Vote::Abstain,
    }));
    voters.push(Arc::new(CommentsDisabled));
    voters.push(Arc::new(KeywordVoter {
        name: "news_in_channel",
        rationale: "News channels report on scams rather than record calls",
        category: Category::Content,
        matches: vec![(Field::Channel, "news")],
        hit: Vote::NotCall,
        miss: Vote::Abstain,
    }));
    voters.push(Arc::new(
        KeywordVoter::title_or_desc(
            "scambait_in_title_or_desc",
            "The word scambait in the title or description makes a scambaiting call much more likely",
            Category::Content,
            &["scambait"],
            Vote::Call,
        )
        .otherwise(Vote::NotCall),
    ));
    voters.push(Arc::new(KeywordVoter {
        name: "travelling_in_title_or_desc",
        rationale: "Travel content is not a scam call",
        category: Category::Content,
        matches: vec![(Field::Title, "travel"), (Field::Desc, "travelling")],
        hit: Vote::NotCall,
        miss: Vote::Abstain,
    }));
    voters.push(Arc::new(KeywordVoter::title_or_desc(
        "scammer_in_title_or_desc",
        "The word scammer in the title or description makes a scambaiting call much more likely",
        Category::Content,
        &["scammer"],
        Vote::Call,
    )));

    voters
}

/// Smaller videos likely have less budget and are raw call recordings
pub struct SmallVideo {
    pub max_views: u64,
}

impl LabelingFunction for SmallVideo {
    fn name(&self) -> &'static str {
        "small_video"
    }

    fn rationale(&self) -> &'static str {
        "Smaller videos likely have less budget"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    fn vote(&self, record: &Record) -> Vote {
        if record.views < self.max_views {
            Vote::Call
        } else {
            Vote::Abstain
        }
    }
}

pub struct CommentsDisabled;

impl LabelingFunction for CommentsDisabled {
    fn name(&self) -> &'static str {
        "comments_disabled"
    }

    fn rationale(&self) -> &'static str {
        "Comments disabled implies this may be a news snippet"
    }

    fn category(&self) -> Category {
        Category::Content
    }

    fn vote(&self, record: &Record) -> Vote {
        if record.comments_disabled() {
            Vote::NotCall
        } else {
            Vote::Abstain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sbws_common::COMMENTS_DISABLED;

    fn voter(name: &str) -> SharedLf {
        all()
            .into_iter()
            .find(|lf| lf.name() == name)
            .unwrap_or_else(|| panic!("no voter named {}", name))
    }

    #[test]
    fn test_scambait_votes_notcall_when_absent() {
        let lf = voter("scambait_in_title_or_desc");
        assert_eq!(lf.vote(&Record::new("Scambaiting live", "", "", 0)), Vote::Call);
        assert_eq!(lf.vote(&Record::new("", "#scambait", "", 0)), Vote::Call);
        assert_eq!(lf.vote(&Record::new("cooking", "pasta", "", 0)), Vote::NotCall);
    }

    #[test]
    fn test_small_video_threshold() {
        let lf = voter("small_video");
        assert_eq!(lf.vote(&Record::new("", "", "", 19_999)), Vote::Call);
        assert_eq!(lf.vote(&Record::new("", "", "", 20_000)), Vote::Abstain);
    }

    #[test]
    fn test_comments_disabled() {
        let lf = voter("comments_disabled");
        let disabled = Record::new("", "", "", 0).with_comments(vec![COMMENTS_DISABLED.to_string()]);
        assert_eq!(lf.vote(&disabled), Vote::NotCall);
        assert_eq!(lf.vote(&Record::new("", "", "", 0)), Vote::Abstain);
    }

    #[test]
    fn test_field_specific_keywords() {
        // "live" only counts in the title
        let live = voter("live_stream");
        assert_eq!(live.vote(&Record::new("LIVE now", "", "", 0)), Vote::NotCall);
        assert_eq!(live.vote(&Record::new("", "live link below", "", 0)), Vote::Abstain);

        // "news" only counts in the channel name
        let news = voter("news_in_channel");
        assert_eq!(news.vote(&Record::new("news", "", "Baiter", 0)), Vote::Abstain);
        assert_eq!(news.vote(&Record::new("", "", "Channel 4 News", 0)), Vote::NotCall);

        // "travel" in the title, "travelling" in the description
        let travel = voter("travelling_in_title_or_desc");
        assert_eq!(travel.vote(&Record::new("Travel diary", "", "", 0)), Vote::NotCall);
        assert_eq!(travel.vote(&Record::new("", "travel", "", 0)), Vote::Abstain);
        assert_eq!(travel.vote(&Record::new("", "Travelling Peru", "", 0)), Vote::NotCall);
    }

    #[test]
    fn test_sponsor_and_hack_read_description() {
        assert_eq!(
            voter("sponsor_in_video").vote(&Record::new("", "Sponsored by NordVPN", "", 0)),
            Vote::NotCall
        );
        assert_eq!(
            voter("hacking").vote(&Record::new("", "I hacked his computer", "", 0)),
            Vote::NotCall
        );
        assert_eq!(
            voter("hacking").vote(&Record::new("hack", "", "", 0)),
            Vote::Abstain
        );
    }
}
