//! Taxonomy source: ordered axis labels and problem-cluster templates.
//!
//! A [`Taxonomy`] is an immutable value. It is either the built-in default
//! (see [`default_taxonomy`]) or built from an externally generated
//! [`ProductConfig`]. Synthesis and every label lookup take the taxonomy by
//! reference; regeneration swaps the whole value.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::distribution::AXIS_SLOTS;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TaxonomyError {
    #[error("{axis} must contain exactly {expected} labels, got {actual}")]
    AxisLength {
        axis: Axis,
        expected: usize,
        actual: usize,
    },
    #[error("{axis} label #{index} is empty")]
    EmptyLabel { axis: Axis, index: usize },
    #[error("product config contains no clusters")]
    NoClusters,
    #[error("cluster #{index} has an empty name")]
    EmptyClusterName { index: usize },
    #[error("cluster {name:?} has no signal templates")]
    EmptyTemplates { name: String },
    #[error("cluster {name:?} has unknown journey stage {stage:?}")]
    UnknownStage { name: String, stage: String },
    #[error("cluster {name:?} has non-finite impact weight")]
    InvalidImpactWeight { name: String },
}

// =============================================================================
// Axes
// =============================================================================

/// One of the three categorical axes of the cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    /// Customer jobs, rendered along X.
    Job,
    /// Usage contexts, rendered along Y.
    Context,
    /// User segments, rendered along Z.
    Segment,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::Job, Axis::Context, Axis::Segment];

    /// Index of this axis in a `[x, y, z]` position.
    pub fn world_component(&self) -> usize {
        match self {
            Axis::Job => 0,
            Axis::Context => 1,
            Axis::Segment => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Axis::Job => "jobs",
            Axis::Context => "contexts",
            Axis::Segment => "segments",
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Journey stages
// =============================================================================

/// Ordered customer-journey stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JourneyStage {
    Awareness,
    Consideration,
    Purchase,
    Onboarding,
    #[serde(rename = "Active Use")]
    ActiveUse,
    Retention,
    Advocacy,
}

impl JourneyStage {
    pub const ALL: [JourneyStage; 7] = [
        JourneyStage::Awareness,
        JourneyStage::Consideration,
        JourneyStage::Purchase,
        JourneyStage::Onboarding,
        JourneyStage::ActiveUse,
        JourneyStage::Retention,
        JourneyStage::Advocacy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JourneyStage::Awareness => "Awareness",
            JourneyStage::Consideration => "Consideration",
            JourneyStage::Purchase => "Purchase",
            JourneyStage::Onboarding => "Onboarding",
            JourneyStage::ActiveUse => "Active Use",
            JourneyStage::Retention => "Retention",
            JourneyStage::Advocacy => "Advocacy",
        }
    }

    /// Lenient parse: case, spaces, underscores and hyphens are ignored.
    pub fn from_str(s: &str) -> Option<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "awareness" => Some(JourneyStage::Awareness),
            "consideration" => Some(JourneyStage::Consideration),
            "purchase" => Some(JourneyStage::Purchase),
            "onboarding" => Some(JourneyStage::Onboarding),
            "activeuse" => Some(JourneyStage::ActiveUse),
            "retention" => Some(JourneyStage::Retention),
            "advocacy" => Some(JourneyStage::Advocacy),
            _ => None,
        }
    }
}

impl fmt::Display for JourneyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Taxonomy
// =============================================================================

/// A named problem group with its candidate signal texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProblemTemplate {
    pub name: String,
    /// Fixed stage from an external config; `None` means drawn at synthesis.
    pub journey_stage: Option<JourneyStage>,
    /// Business criticality 1–10 from an external config.
    pub impact_weight: Option<f64>,
    pub templates: Vec<String>,
}

/// Where a taxonomy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyOrigin {
    BuiltIn,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Taxonomy {
    pub product_name: String,
    pub jobs: Vec<String>,
    pub segments: Vec<String>,
    pub contexts: Vec<String>,
    pub problems: Vec<ProblemTemplate>,
    pub origin: TaxonomyOrigin,
}

impl Taxonomy {
    /// Ordered labels for an axis.
    pub fn labels(&self, axis: Axis) -> &[String] {
        match axis {
            Axis::Job => &self.jobs,
            Axis::Context => &self.contexts,
            Axis::Segment => &self.segments,
        }
    }

    /// Label of a slot on an axis, if the slot exists.
    pub fn label(&self, axis: Axis, slot: usize) -> Option<&str> {
        self.labels(axis).get(slot).map(String::as_str)
    }

    pub fn problem_names(&self) -> impl Iterator<Item = &str> {
        self.problems.iter().map(|p| p.name.as_str())
    }

    /// Check the structural invariants every synthesis relies on.
    pub fn validate(&self) -> Result<(), TaxonomyError> {
        for axis in Axis::ALL {
            let labels = self.labels(axis);
            if labels.len() != AXIS_SLOTS {
                return Err(TaxonomyError::AxisLength {
                    axis,
                    expected: AXIS_SLOTS,
                    actual: labels.len(),
                });
            }
            if let Some(index) = labels.iter().position(|l| l.trim().is_empty()) {
                return Err(TaxonomyError::EmptyLabel { axis, index });
            }
        }
        if self.problems.is_empty() {
            return Err(TaxonomyError::NoClusters);
        }
        for (index, problem) in self.problems.iter().enumerate() {
            if problem.name.trim().is_empty() {
                return Err(TaxonomyError::EmptyClusterName { index });
            }
            if problem.templates.iter().all(|t| t.trim().is_empty()) {
                return Err(TaxonomyError::EmptyTemplates {
                    name: problem.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stable content hash, used to tag generations in logs and snapshots.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.product_name.as_bytes());
        for axis in Axis::ALL {
            hasher.update(b"\x1e");
            for label in self.labels(axis) {
                hasher.update(label.as_bytes());
                hasher.update(b"\x1f");
            }
        }
        for problem in &self.problems {
            hasher.update(b"\x1e");
            hasher.update(problem.name.as_bytes());
            for template in &problem.templates {
                hasher.update(b"\x1f");
                hasher.update(template.as_bytes());
            }
        }
        hasher.finalize().to_hex()[..16].to_string()
    }
}

// =============================================================================
// External product config
// =============================================================================

/// Cluster entry of an externally generated product config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterConfig {
    pub name: String,
    pub journey_stage: String,
    pub impact_weight: f64,
    #[serde(default)]
    pub templates: Vec<String>,
}

/// Generation input produced by the taxonomy provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductConfig {
    pub product_name: String,
    pub jobs: Vec<String>,
    pub segments: Vec<String>,
    pub contexts: Vec<String>,
    pub clusters: Vec<ClusterConfig>,
}

impl ProductConfig {
    /// Validate and convert into a taxonomy.
    ///
    /// Clusters are ordered by impact weight, highest first, so the rank-based
    /// impact tiers go to the problems the provider marked most critical.
    /// Equal weights keep their supplied order.
    pub fn into_taxonomy(self) -> Result<Taxonomy, TaxonomyError> {
        if self.clusters.is_empty() {
            return Err(TaxonomyError::NoClusters);
        }

        let mut problems = Vec::with_capacity(self.clusters.len());
        for (index, cluster) in self.clusters.into_iter().enumerate() {
            let name = cluster.name.trim().to_string();
            if name.is_empty() {
                return Err(TaxonomyError::EmptyClusterName { index });
            }
            if !cluster.impact_weight.is_finite() {
                return Err(TaxonomyError::InvalidImpactWeight { name });
            }
            let stage = JourneyStage::from_str(&cluster.journey_stage).ok_or_else(|| {
                TaxonomyError::UnknownStage {
                    name: name.clone(),
                    stage: cluster.journey_stage.clone(),
                }
            })?;
            let templates: Vec<String> = cluster
                .templates
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if templates.is_empty() {
                return Err(TaxonomyError::EmptyTemplates { name });
            }
            problems.push(ProblemTemplate {
                name,
                journey_stage: Some(stage),
                impact_weight: Some(cluster.impact_weight),
                templates,
            });
        }

        problems.sort_by(|a, b| {
            let wa = a.impact_weight.unwrap_or(0.0);
            let wb = b.impact_weight.unwrap_or(0.0);
            wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
        });

        let taxonomy = Taxonomy {
            product_name: self.product_name.trim().to_string(),
            jobs: trim_all(self.jobs),
            segments: trim_all(self.segments),
            contexts: trim_all(self.contexts),
            problems,
            origin: TaxonomyOrigin::External,
        };
        taxonomy.validate()?;
        Ok(taxonomy)
    }
}

fn trim_all(labels: Vec<String>) -> Vec<String> {
    labels.into_iter().map(|l| l.trim().to_string()).collect()
}

// =============================================================================
// Built-in default
// =============================================================================

const DEFAULT_PRODUCT: &str = "Apparel marketplace";

const DEFAULT_JOBS: [&str; AXIS_SLOTS] = [
    "Refresh my wardrobe for the new season",
    "Quickly replace a worn-out item",
    "Find clothes that fit a non-standard figure",
    "Look confident at an important meeting",
    "Put together an outfit for a special occasion",
    "Dress comfortably for everyday errands",
    "Find a thoughtful gift for someone close",
    "Build a capsule wardrobe on a budget",
    "Dress the kids for school and play",
    "Express my personal style",
];

// Ordered from active/young to passive/older.
const DEFAULT_SEGMENTS: [&str; AXIS_SLOTS] = [
    "Active schoolgirls",
    "University students",
    "Young professionals",
    "Freelancers and digital nomads",
    "Young mothers",
    "Office managers",
    "Business executives",
    "Entrepreneurs 45+",
    "Active retirees",
    "Retirees with limited mobility",
];

// Ordered from low-intensity/private to high-intensity/public.
const DEFAULT_CONTEXTS: [&str; AXIS_SLOTS] = [
    "In bed at night",
    "Morning coffee (tablet)",
    "Commuting (phone)",
    "On the run (quick search)",
    "Lunch break (desktop)",
    "Working hours (background)",
    "Evening shopping (laptop)",
    "In store (price comparison)",
    "Urgent purchase before a trip",
    "Critical situation (something tore)",
];

const DEFAULT_PROBLEMS: [(&str, [&str; 4]); 45] = [
    ("Unclear which styles are on trend", [
        "Searched 'what is trending this autumn' and got last year's looks",
        "Review: no idea if this cut is still in fashion",
        "Scrolled new arrivals for 20 minutes and could not tell what is current",
        "Asked in chat which jeans are in style right now",
    ]),
    ("Hard to assemble a coherent outfit", [
        "Cannot see what to wear this blouse with",
        "Review: bought a skirt and nothing in my closet matches it",
        "Searched 'complete office look' with no useful results",
        "Interview: I build outfits in my head and usually fail",
    ]),
    ("No ready-made capsule collections", [
        "Have to hunt for every piece of a capsule one by one",
        "Searched 'capsule wardrobe' and only found blog posts",
        "Interview: I would pay more for a pre-matched set",
        "Chat: asked for a ten-piece travel capsule and got a catalog link",
    ]),
    ("Fabric pills and loses its look quickly", [
        "Review: sweater pilled after two wears",
        "Ticket: knitwear looks old after one month",
        "Photo review shows fuzz balls on the sleeves",
        "Interview: I stopped buying knits here because of pilling",
    ]),
    ("Needed size out of stock for over a week", [
        "Size M has been unavailable for ten days",
        "Searched my size in three colors and none were in stock",
        "Ticket: when will size 44 be back?",
        "Abandoned cart after my size disappeared",
    ]),
    ("Return process is too long and complex", [
        "Ticket: return label never arrived",
        "Review: returning a dress took three visits to the pickup point",
        "Interview: the return form asks for the same data twice",
        "Chat: asked how to return a gift without a receipt",
    ]),
    ("Clothes hang baggy and hide the figure", [
        "Review: shirt hangs like a sack on me",
        "Interview: straight cuts make me look shapeless",
        "Returned the coat because it had no waist at all",
        "Searched 'fitted silhouette' and got oversized items",
    ]),
    ("Sleeves are systematically too short", [
        "Review: sleeves end above the wrist in every size",
        "Ticket: can you list sleeve length in the size chart?",
        "Interview: I have long arms and nothing fits",
        "Searched 'long sleeve length' with no filter for it",
    ]),
    ("Cut proportions do not suit my body", [
        "Review: narrow hips and wide waist, trousers never sit right",
        "Interview: patterns assume one body shape",
        "Chat: asked which brand cuts for a pear shape",
        "Returned three pairs of jeans in one month",
    ]),
    ("No models for tall customers", [
        "Searched 'tall fit' and got two results",
        "Review: dress is a mini on me although listed as midi",
        "Interview: I shop in the men's section for length",
        "Ticket: please add a tall line",
    ]),
    ("Oversized cuts look bulky", [
        "Review: oversized coat adds ten kilos visually",
        "Interview: I avoid the trend because it swallows me",
        "Returned an oversized hoodie as unflattering",
        "Chat: asked for a relaxed fit that is not oversized",
    ]),
    ("Delivery dates are opaque", [
        "Ticket: order says 'soon' with no date",
        "Review: no idea if it arrives before my trip",
        "Abandoned checkout because the delivery estimate was missing",
        "Chat: asked three times when the courier will come",
    ]),
    ("Size charts inconsistent between brands", [
        "Review: I am an S in one brand and an L in another",
        "Ticket: size chart contradicts the product label",
        "Interview: I order two sizes every time",
        "Searched 'size conversion' and found nothing on the site",
    ]),
    ("Product photos misrepresent color", [
        "Review: the beige arrived almost orange",
        "Ticket: color differs from the picture",
        "Interview: I only buy black now because colors lie",
        "Returned a blouse because the shade was wrong",
    ]),
    ("Filters do not narrow results usefully", [
        "Searched dresses with filters and still saw 4,000 items",
        "Session: applied five filters and reset them all",
        "Review: filter by sleeve length does not exist",
        "Interview: filters feel decorative",
    ]),
    ("Checkout fails on mobile", [
        "Session: checkout button unresponsive on phone",
        "Ticket: payment page froze twice",
        "Abandoned cart after the app crashed at payment",
        "Review: had to finish the order on a laptop",
    ]),
    ("Promo codes rejected at checkout", [
        "Ticket: birthday promo code says invalid",
        "Abandoned checkout after the discount failed",
        "Chat: asked why the newsletter code does not apply",
        "Review: advertised code never worked",
    ]),
    ("Too few payment options", [
        "Abandoned checkout because split payment is unavailable",
        "Interview: I want to pay by installment for coats",
        "Ticket: cannot pay with my wallet app",
        "Review: card-only payment in 2024?",
    ]),
    ("Hidden delivery fees appear late", [
        "Abandoned cart when shipping fees appeared at the last step",
        "Review: free delivery threshold changed silently",
        "Ticket: charged for delivery I thought was free",
        "Interview: I feel tricked by late fees",
    ]),
    ("Courier arrives outside the promised slot", [
        "Ticket: courier came at 8am instead of the evening",
        "Review: waited at home all day for nothing",
        "Chat: asked to reschedule and got no answer",
        "Interview: I switched to pickup points after missed slots",
    ]),
    ("Cannot try items on before paying", [
        "Interview: I want to try on at the door and pay for what fits",
        "Chat: asked about try-on before purchase",
        "Review: paying upfront for five sizes is painful",
        "Searched 'try on delivery' with no results",
    ]),
    ("Fitting-room booking in store is confusing", [
        "Review: booked a fitting room but nobody knew about it",
        "Ticket: in-store reservation disappeared",
        "Interview: the reserve-and-try flow is unclear",
        "Session: gave up on the store booking form",
    ]),
    ("Refund takes weeks to arrive", [
        "Ticket: refund still pending after three weeks",
        "Review: money back took longer than delivery",
        "Chat: asked for the refund status again",
        "Interview: slow refunds stop me from ordering sizes to compare",
    ]),
    ("Support replies are slow", [
        "Ticket: no reply for four days",
        "Review: support agent answered with a template",
        "Chat: bot loop, could not reach a human",
        "Interview: I avoid contacting support at all",
    ]),
    ("Loyalty points are hard to understand", [
        "Chat: asked how many points I have and when they expire",
        "Review: points vanished before I could use them",
        "Interview: the bonus rules change too often",
        "Session: opened the loyalty page and left after ten seconds",
    ]),
    ("Wishlist items disappear without notice", [
        "Review: saved items vanished from my wishlist",
        "Ticket: wishlist emptied after an app update",
        "Interview: I keep screenshots instead of using the wishlist",
        "Session: searched again for an item that used to be saved",
    ]),
    ("Restock notifications never arrive", [
        "Ticket: subscribed to restock but got no email",
        "Review: item came back and sold out before I heard",
        "Interview: notify-me button feels fake",
        "Chat: asked whether the restock alert works",
    ]),
    ("Recommendations repeat what I already bought", [
        "Review: keeps showing me the same coat I bought",
        "Interview: recommendations ignore my purchases",
        "Session: scrolled past five identical suggestions",
        "Chat: asked how to turn off irrelevant suggestions",
    ]),
    ("Reviews lack body-type context", [
        "Interview: I need reviews from people with my height",
        "Searched reviews for 'petite' and found nothing",
        "Review: would help to know the reviewer's size",
        "Chat: asked if the dress works for a curvy figure",
    ]),
    ("Fabric composition info missing", [
        "Ticket: product page does not list the fabric",
        "Review: thought it was cotton, it is polyester",
        "Chat: asked about wool percentage",
        "Searched 'natural fabrics' and results included synthetics",
    ]),
    ("Care instructions unclear", [
        "Review: shrank on the first wash, no care label online",
        "Ticket: how should I wash this silk blouse?",
        "Interview: I hand-wash everything just in case",
        "Chat: asked if the jacket can go in the dryer",
    ]),
    ("Seams come apart after first wash", [
        "Review: side seam split after one wash",
        "Ticket: stitching came undone on new trousers",
        "Photo review of a torn hem after a week",
        "Interview: quality control feels random",
    ]),
    ("Shoes run half a size small", [
        "Review: order half a size up",
        "Ticket: exchanged sneakers twice for size",
        "Interview: I never trust shoe sizes here",
        "Searched 'wide fit shoes' with few results",
    ]),
    ("Account login keeps expiring", [
        "Session: logged out in the middle of checkout",
        "Ticket: asked to re-enter password every day",
        "Review: lost my cart after being logged out",
        "Interview: I shop as a guest to avoid login problems",
    ]),
    ("App is slow to load the catalog", [
        "Session: catalog took eight seconds to load",
        "Review: the app lags on older phones",
        "Interview: I browse on the website because the app is slow",
        "Ticket: images never finish loading on mobile data",
    ]),
    ("Search misunderstands colloquial terms", [
        "Searched 'mom jeans' and got maternity wear",
        "Searched 'little black dress' and got children's clothes",
        "Interview: I have to guess the catalog's words",
        "Chat: asked where to find 'puffer' jackets",
    ]),
    ("Gift wrapping unavailable", [
        "Chat: asked for gift wrapping and it is not offered",
        "Review: gift arrived in a plain plastic bag",
        "Interview: I buy gifts elsewhere for the packaging",
        "Ticket: can the price be hidden on the receipt?",
    ]),
    ("Cannot change order after placing it", [
        "Ticket: wanted to change size five minutes after ordering",
        "Chat: asked to add an item to an existing order",
        "Review: had to cancel and reorder to fix the address",
        "Interview: one typo cost me a whole order",
    ]),
    ("Exchange for another size requires full return", [
        "Ticket: no direct size exchange available",
        "Review: had to return and buy again at a higher price",
        "Interview: exchanging should be one click",
        "Chat: asked how to swap M for L",
    ]),
    ("Price drops right after purchase", [
        "Review: price fell 30% two days after I bought it",
        "Ticket: asked for the difference back",
        "Interview: I wait for sales and never buy at full price",
        "Chat: asked about price protection",
    ]),
    ("Sustainability claims are vague", [
        "Interview: 'eco collection' means nothing to me without details",
        "Searched 'recycled materials' and found no explanation",
        "Review: greenwashing label on a polyester dress",
        "Chat: asked where the clothes are made",
    ]),
    ("Kids' sizes outgrown before season ends", [
        "Interview: children grow out of it in two months",
        "Review: kids' sizes run small",
        "Searched 'grow-with-me' clothing",
        "Chat: asked whether to size up for children",
    ]),
    ("Limited inclusive sizing in premium lines", [
        "Review: the premium line stops at size 48",
        "Searched 'plus size premium' and got the basic line",
        "Interview: I feel excluded from the nicer collections",
        "Ticket: please extend sizes in the new collection",
    ]),
    ("Store and online stock disagree", [
        "Review: site said in stock at the store, it was not",
        "Ticket: drove to the shop for nothing",
        "Chat: asked to confirm store availability",
        "Interview: I call the store before trusting the website",
    ]),
    ("Onboarding asks too many questions", [
        "Session: abandoned the style quiz at question 12",
        "Review: sign-up takes longer than shopping",
        "Interview: I skipped the profile setup entirely",
        "Ticket: why do you need my birth date?",
    ]),
];

static DEFAULT_TAXONOMY: Lazy<Arc<Taxonomy>> = Lazy::new(|| {
    Arc::new(Taxonomy {
        product_name: DEFAULT_PRODUCT.to_string(),
        jobs: DEFAULT_JOBS.iter().map(|s| s.to_string()).collect(),
        segments: DEFAULT_SEGMENTS.iter().map(|s| s.to_string()).collect(),
        contexts: DEFAULT_CONTEXTS.iter().map(|s| s.to_string()).collect(),
        problems: DEFAULT_PROBLEMS
            .iter()
            .map(|(name, templates)| ProblemTemplate {
                name: name.to_string(),
                journey_stage: None,
                impact_weight: None,
                templates: templates.iter().map(|t| t.to_string()).collect(),
            })
            .collect(),
        origin: TaxonomyOrigin::BuiltIn,
    })
});

/// The built-in taxonomy, shared and immutable.
pub fn default_taxonomy() -> Arc<Taxonomy> {
    Arc::clone(&DEFAULT_TAXONOMY)
}
