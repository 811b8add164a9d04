//! 练习来电的情景剧本。

use rand::seq::SliceRandom;
use rand::Rng;

/// 一次来电使用的角色扮演情景，创建后不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    pub title: String,
    pub context: String,
    pub seed_lines: Vec<String>,
}

impl Scenario {
    pub fn new<T, C, I, L>(title: T, context: C, seed_lines: I) -> Self
    where
        T: Into<String>,
        C: Into<String>,
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        Self {
            title: title.into(),
            context: context.into(),
            seed_lines: seed_lines.into_iter().map(Into::into).collect(),
        }
    }
}

struct ScenarioTemplate {
    title: &'static str,
    context: &'static str,
    seed_lines: &'static [&'static str],
}

impl ScenarioTemplate {
    fn build(&self) -> Scenario {
        Scenario::new(self.title, self.context, self.seed_lines.iter().copied())
    }
}

const CATALOG: &[ScenarioTemplate] = &[
    ScenarioTemplate {
        title: "🧟 Zombie Apocalypse Survival",
        context: "You're trapped in a mall during a zombie outbreak. You need to communicate with other survivors.",
        seed_lines: &[
            "I hear them getting closer. Do you have any weapons or supplies?",
            "There's an exit through the back. Should we make a run for it now?",
        ],
    },
    ScenarioTemplate {
        title: "✈️ Airport Check-in Emergency",
        context: "Your flight is delayed and you need to rebook. The counter agent is helping you.",
        seed_lines: &[
            "I'm sorry, but your flight has been cancelled due to weather. Let me help you find alternatives.",
            "We have a flight tomorrow morning at 8 AM, or tonight at 11 PM. Which would you prefer?",
            "I can offer you a hotel voucher for tonight. Will you need transportation as well?",
        ],
    },
    ScenarioTemplate {
        title: "🍕 Pizza Order Mix-up",
        context: "You ordered pizza but got the wrong order. You're calling to resolve the issue.",
        seed_lines: &[
            "Hello, this is Mario's Pizza. How can I help you today?",
            "Oh no! I'm so sorry about the mix-up. Can you tell me what you ordered originally?",
            "I'll send the correct pizza right away and you can keep the wrong one. Sound good?",
        ],
    },
    ScenarioTemplate {
        title: "🏨 Hotel Room Issue",
        context: "The hotel front desk is calling you about a complaint regarding your room (dripping faucet, broken AC, or loud neighbors). You need to describe the issue and work with them to find a solution.",
        seed_lines: &[
            "Good evening, this is the front desk manager. We received a complaint about your room. Can you tell me what's happening?",
            "I sincerely apologize for the inconvenience. Let me see what we can do to resolve this immediately.",
            "I can offer you a room upgrade or have maintenance fix the issue right away. What would you prefer?",
        ],
    },
    ScenarioTemplate {
        title: "💼 Unexpected Job Interview Call",
        context: "A recruiter is calling you unexpectedly for a surprise phone interview about a new position. You need to show confidence and highlight your experience clearly.",
        seed_lines: &[
            "Hi, this is Sarah from TechCorp. I hope I'm not catching you at a bad time - do you have 10 minutes for a quick interview?",
            "Great! Can you tell me about your most significant professional achievement in your current role?",
            "That's impressive. How do you handle working under pressure and tight deadlines?",
        ],
    },
    ScenarioTemplate {
        title: "🎒 Lost Luggage at the Airport",
        context: "A baggage claim agent is calling you to discuss your missing luggage after your flight arrival. You need to describe your bag and arrange for delivery or pickup.",
        seed_lines: &[
            "Hello, this is Delta baggage services calling about your missing luggage from flight 1205. Can you describe your bag for me?",
            "Thank you for those details. Can you tell me what items were inside so we can verify when we locate it?",
            "Perfect. We should have it located within 24 hours. Would you prefer delivery to your hotel or pickup at the airport?",
        ],
    },
    ScenarioTemplate {
        title: "🩺 Doctor Follow-Up Appointment",
        context: "Your doctor is calling to discuss your recent test results and next steps. You need to understand the results and ask any clarifying questions about your health.",
        seed_lines: &[
            "Hi, this is Dr. Smith calling about your recent test results. Do you have a few minutes to discuss them?",
            "Your blood work came back mostly normal, but there are a couple of things I'd like to go over with you.",
            "I'd like to schedule a follow-up appointment to monitor this. Do you have any questions about what we've discussed?",
        ],
    },
];

/// 内置情景的完整列表。
pub fn catalog() -> Vec<Scenario> {
    CATALOG.iter().map(ScenarioTemplate::build).collect()
}

pub fn pick_random() -> Scenario {
    pick_with(&mut rand::thread_rng())
}

pub fn pick_with<R: Rng + ?Sized>(rng: &mut R) -> Scenario {
    match CATALOG.choose(rng) {
        Some(template) => template.build(),
        None => Scenario::new("Practice Call", "", Vec::<String>::new()),
    }
}
