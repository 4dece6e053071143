//! Built-in demo templates so a fresh instance has something due this week.

use chrono::NaiveDate;

use crate::config::friday_of;
use crate::domain::{Answer, Difficulty, Question, QuestionKind, TemplateDefinition, TemplateKind};

pub fn seed_templates(today: NaiveDate) -> Vec<TemplateDefinition> {
  let due = friday_of(today);
  vec![
    TemplateDefinition {
      title: "Study habits check-in".into(),
      description: "Five quick questions about effective learning strategies.".into(),
      kind: TemplateKind::Marked,
      intelligence_tag: "logical-mathematical".into(),
      difficulty: Difficulty::Beginner,
      due_date: due,
      questions: vec![
        Question {
          id: "q1".into(),
          prompt: "Which technique spreads review sessions out over time?".into(),
          kind: QuestionKind::MultipleChoice,
          options: vec!["Cramming".into(), "Spaced repetition".into(), "Highlighting".into()],
          correct_answer: Answer::One("Spaced repetition".into()),
          explanation: "Spacing reviews improves long-term retention.".into(),
        },
        Question {
          id: "q2".into(),
          prompt: "Select every active-recall activity.".into(),
          kind: QuestionKind::MultiSelect,
          options: vec!["Flashcards".into(), "Re-reading".into(), "Practice tests".into()],
          correct_answer: Answer::Many(vec!["Flashcards".into(), "Practice tests".into()]),
          explanation: "Recall means retrieving the answer, not recognising it.".into(),
        },
        Question {
          id: "q3".into(),
          prompt: "Sleep helps consolidate what you learned during the day.".into(),
          kind: QuestionKind::TrueFalse,
          options: vec![],
          correct_answer: Answer::One("true".into()),
          explanation: String::new(),
        },
        Question {
          id: "q4".into(),
          prompt: "Name the technique of explaining a topic in plain words to find gaps.".into(),
          kind: QuestionKind::ShortAnswer,
          options: vec![],
          correct_answer: Answer::One("Feynman technique".into()),
          explanation: String::new(),
        },
      ],
    },
    TemplateDefinition {
      title: "Weekly reflection".into(),
      description: "Describe one obstacle you met this week and how you handled it.".into(),
      kind: TemplateKind::Reflection,
      intelligence_tag: "intrapersonal".into(),
      difficulty: Difficulty::Beginner,
      due_date: due,
      questions: vec![],
    },
    TemplateDefinition {
      title: "Teach-back video".into(),
      description: "Record a two-minute explanation of a topic you learned and attach the link.".into(),
      kind: TemplateKind::HandsOn,
      intelligence_tag: "interpersonal".into(),
      difficulty: Difficulty::Intermediate,
      due_date: due,
      questions: vec![],
    },
  ]
}
