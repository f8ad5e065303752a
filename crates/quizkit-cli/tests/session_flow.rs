//! End-to-end session tests wiring the engine to the real collaborators.
//!
//! These tests load the sample quizzes from disk, answer them through the
//! engine, and check grading, manual review and draft persistence.

use std::path::Path;
use std::sync::Arc;

use quizkit_core::engine::{EngineConfig, QuizEngine};
use quizkit_core::error::CollaboratorError;
use quizkit_core::grading::SessionStatus;
use quizkit_core::model::ManualGrade;
use quizkit_core::parser::parse_quiz;
use quizkit_core::render::RenderedSegment;
use quizkit_core::session::{Event, Phase, Rejection};
use quizkit_sources::mock::{FailingGradeStore, MockContentSource, MockTypesetter};
use quizkit_sources::{FileContentSource, FileDraftStore, MarkupTypesetter, MemoryGradeStore};

const QUIZ_DIR: &str = "../../quizzes";

fn engine(quiz_id: &str, grades: Arc<MemoryGradeStore>) -> QuizEngine {
    QuizEngine::new(
        quiz_id,
        Arc::new(FileContentSource::new(QUIZ_DIR)),
        Arc::new(MarkupTypesetter::new()),
        grades,
        EngineConfig {
            seed: Some(3),
            ..EngineConfig::default()
        },
    )
}

fn answer_algebra(engine: &mut QuizEngine) {
    let events = [
        Event::Select {
            question_id: "square".into(),
            option: 1,
        },
        Event::Toggle {
            question_id: "evens".into(),
            option: 0,
        },
        Event::Toggle {
            question_id: "evens".into(),
            option: 2,
        },
        Event::FillGap {
            question_id: "roots".into(),
            gap: 0,
            value: "1".into(),
        },
        Event::FillGap {
            question_id: "roots".into(),
            gap: 1,
            value: " -1 ".into(),
        },
        Event::EnterText {
            question_id: "proof".into(),
            text: "Suppose sqrt 2 = p/q in lowest terms.".into(),
        },
    ];
    for event in events {
        engine.dispatch(event).unwrap();
    }
}

#[tokio::test]
async fn feed_session_with_manual_review() {
    let grades = Arc::new(MemoryGradeStore::new());
    let mut engine = engine("algebra", grades.clone());

    engine.load().await.unwrap();
    assert_eq!(engine.phase(), Phase::Open);
    assert_eq!(engine.pass_threshold(), 0.75);
    assert!(engine.deadline().is_some());

    answer_algebra(&mut engine);
    assert_eq!(engine.dispatch(Event::CheckAll).unwrap(), Phase::Checked);

    let result = engine.grading().unwrap();
    assert_eq!(result.status, SessionStatus::PendingReview);
    assert_eq!(result.stats.correct_items(), 4);
    assert_eq!(result.stats.pending_review, 1);

    // The reviewer marks the essay below the pass mark.
    grades.record(
        "algebra",
        "proof",
        ManualGrade {
            is_graded: true,
            score_percentage: 50.0,
            feedback: Some("Missing the parity step".into()),
        },
    );
    assert_eq!(engine.refresh_manual_grades().await, 1);

    let result = engine.grading().unwrap();
    assert_eq!(result.status, SessionStatus::Passed);
    assert_eq!(result.stats.correct_items(), 4);
    assert_eq!(result.stats.graded_items(), 5);
    let proof = result.item("proof").unwrap();
    assert_eq!(proof.feedback.as_deref(), Some("Missing the parity step"));
    // 2 + 1 + 1 + 2 points automatic, half of 3 for the essay
    assert!((result.earned_points - 5.5).abs() < 1e-9);
    assert!((result.total_points - 7.0).abs() < 1e-9);

    // Retry clears answers but keeps the manual grade.
    assert_eq!(engine.dispatch(Event::Retry).unwrap(), Phase::Open);
    assert!(engine.session().answers().is_empty());
    assert!(engine.grading().is_none());
    assert!(engine.manual_grades().contains_key("proof"));
}

#[tokio::test]
async fn sequential_session_checks_each_question() {
    let mut engine = engine("capitals", Arc::new(MemoryGradeStore::new()));
    engine.load().await.unwrap();
    assert_eq!(engine.phase(), Phase::Title);
    assert!(engine.deadline().is_none());

    engine.dispatch(Event::Start).unwrap();
    assert_eq!(
        engine.label(0).as_deref(),
        Some("Question 1 of 4")
    );

    // Checking without an answer is refused and changes nothing.
    let rejection = engine.dispatch(Event::Check).unwrap_err();
    assert!(matches!(rejection, Rejection::Incomplete { .. }));
    assert_eq!(engine.phase(), Phase::Question);

    // Only the current question accepts input.
    let rejection = engine
        .dispatch(Event::EnterText {
            question_id: "italy".into(),
            text: "Rome".into(),
        })
        .unwrap_err();
    assert!(matches!(rejection, Rejection::NotCurrent(_)));

    engine
        .dispatch(Event::Select {
            question_id: "france".into(),
            option: 0,
        })
        .unwrap();
    engine.dispatch(Event::Check).unwrap();
    assert_eq!(
        engine.grading().unwrap().item("france").unwrap().verdict,
        quizkit_core::answer::Verdict::Correct
    );
    engine.dispatch(Event::Advance).unwrap();

    engine
        .dispatch(Event::EnterText {
            question_id: "italy".into(),
            text: "Milan".into(),
        })
        .unwrap();
    engine.dispatch(Event::Check).unwrap();
    engine.dispatch(Event::Advance).unwrap();

    for (gap, value) in ["Brussels", "Amsterdam"].into_iter().enumerate() {
        engine
            .dispatch(Event::FillGap {
                question_id: "benelux".into(),
                gap,
                value: value.into(),
            })
            .unwrap();
    }
    engine.dispatch(Event::Check).unwrap();
    assert_eq!(engine.dispatch(Event::Advance).unwrap(), Phase::Completed);

    let report = engine.report().unwrap();
    assert_eq!(report.grading.stats.correct_items(), 3);
    assert!(report.grading.passed);
    let md = report.to_markdown();
    assert!(md.contains("## World Capitals"));
    assert!(md.contains("- **italy:** Rome has been the capital since 1871."));

    // Retake starts over from the title screen with the same display order.
    let order = engine.session().display_order().cloned();
    assert_eq!(engine.dispatch(Event::Retake).unwrap(), Phase::Title);
    assert!(engine.session().answers().is_empty());
    assert_eq!(engine.session().display_order().cloned(), order);
}

#[tokio::test]
async fn draft_survives_restart() {
    let drafts_dir = tempfile::tempdir().unwrap();
    let grades = Arc::new(MemoryGradeStore::new());

    let mut first = engine("capitals", grades.clone())
        .with_drafts(Arc::new(FileDraftStore::new(drafts_dir.path())));
    first.load().await.unwrap();
    first.dispatch(Event::Start).unwrap();
    first
        .dispatch(Event::Select {
            question_id: "france".into(),
            option: 0,
        })
        .unwrap();
    first.save_draft().await.unwrap();
    let session_id = first.session().id();
    drop(first);

    let mut second = engine("capitals", grades)
        .with_drafts(Arc::new(FileDraftStore::new(drafts_dir.path())));
    assert!(second.resume(session_id).await.unwrap());
    assert_eq!(second.phase(), Phase::Question);
    assert_eq!(second.session().id(), session_id);
    assert_eq!(second.session().answers().len(), 1);
    second.dispatch(Event::Check).unwrap();

    second.discard_draft().await.unwrap();
    assert!(!second.resume(session_id).await.unwrap());
}

#[tokio::test]
async fn missing_quiz_keeps_engine_stalled() {
    let mut engine = engine("ghost", Arc::new(MemoryGradeStore::new()));
    let err = engine.load().await.unwrap_err();
    assert!(format!("{err:#}").contains("failed to load quiz ghost"));
    assert_eq!(engine.phase(), Phase::Stalled);
    assert!(matches!(
        engine.dispatch(Event::Start),
        Err(Rejection::NotAllowed { .. })
    ));
}

#[tokio::test]
async fn transient_outage_can_be_retried() {
    let document = parse_quiz(Path::new("../../quizzes/capitals.toml")).unwrap();
    let source = Arc::new(MockContentSource::new(document).with_outages(1));
    let mut engine = QuizEngine::new(
        "capitals",
        source.clone(),
        Arc::new(MockTypesetter::new()),
        Arc::new(MemoryGradeStore::new()),
        EngineConfig::default(),
    );

    let err = engine.load().await.unwrap_err();
    assert!(!CollaboratorError::classify(&err).unwrap().is_permanent());
    assert_eq!(engine.phase(), Phase::Stalled);

    engine.load().await.unwrap();
    assert_eq!(engine.phase(), Phase::Title);
    assert_eq!(source.call_count(), 2);
    assert_eq!(source.last_request().as_deref(), Some("capitals"));
}

#[tokio::test]
async fn collaborator_failures_degrade_gracefully() {
    let document = parse_quiz(Path::new("../../quizzes/algebra.json")).unwrap();
    let typesetter = Arc::new(MockTypesetter::new().rejecting("3^2"));
    let mut engine = QuizEngine::new(
        "algebra",
        Arc::new(MockContentSource::new(document)),
        typesetter.clone(),
        Arc::new(FailingGradeStore),
        EngineConfig::default(),
    );

    // The grade store is offline; loading still succeeds.
    engine.load().await.unwrap();
    assert!(engine.manual_grades().is_empty());

    let rendered = engine.render_all();
    assert_eq!(rendered.len(), 4);
    let square = rendered[0].prompt.as_deref().unwrap();
    assert!(square.contains("class=\"math-error\""));
    assert!(square.contains("3^2"));
    let roots_markup: String = rendered[2]
        .body
        .iter()
        .filter_map(|segment| match segment {
            RenderedSegment::Markup(markup) => Some(markup.as_str()),
            RenderedSegment::Gap { .. } => None,
        })
        .collect();
    assert!(roots_markup.contains("<m>x^2 - 1</m>"));
    assert!(typesetter.call_count() > 0);

    answer_algebra(&mut engine);
    engine.dispatch(Event::CheckAll).unwrap();
    assert_eq!(engine.refresh_manual_grades().await, 0);
    assert_eq!(
        engine.grading().unwrap().status,
        SessionStatus::PendingReview
    );
}
