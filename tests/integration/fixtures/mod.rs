// Standoff pairs with known annotation graphs

/// Two short review sentences
pub const REVIEW_TEXT: &str = "the phone is great\nbattery life is poor but the screen shines";

/// Entities, attributes, an event and a relation over REVIEW_TEXT
pub const REVIEW_ANN: &str = "T1\tTarget 4 9\tphone
T2\tPositive 13 18\tgreat
T3\tTarget 19 31\tbattery life
T4\tNegative 35 39\tpoor
T5\tTarget 48 54\tscreen
T6\tPositive 55 61\tshines
A1\tSentiment E1 Positive
A2\tTarget T5
E1\tOpinion:T2 Holder:T1
R1\tAbout Arg1:T4 Arg2:T3
R2\tAbout Arg1:T6 Arg2:T5
N1\tReference T1 Wiki:Phone\tphone
";

/// Discontinuous entity spanning both sentences
pub const DISCONTINUOUS_TEXT: &str = "hello there\nworld again";
pub const DISCONTINUOUS_ANN: &str = "T1\tPositive 0 5;12 17\thello world\n";

/// Attribute referencing an entity that does not exist
pub const MISSING_REF_ANN: &str = "T1\tTarget 4 9\tphone\nA1\tTarget T99\n";

/// Bare key lines are skipped, the rest of the file is kept
pub const BARE_KEY_ANN: &str = "T5\nT1\tTarget 4 9\tphone\n\nT2\tPositive 13 18\tgreat\n";

/// Span section that is not a pair of integers
pub const BAD_SPAN_ANN: &str = "T1\tTarget four 9\tphone\n";

/// Events whose triggers refer to each other
pub const CYCLIC_ANN: &str = "T1\tTarget 4 9\tphone\nE1\tOpinion:E2 Holder:T1\nE2\tOpinion:E1\n";
