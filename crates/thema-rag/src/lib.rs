//! # thema-rag
//!
//! The Question Processor (§4.I), Context Builder (§4.J), and Response
//! Generator (§4.K) that turn an incoming chat question into a grounded,
//! Korean-language answer over a user's aptitude-test documents.

pub mod context;
pub mod question;
pub mod response;

pub use context::{
    assess_preference_data_availability, ConstructedContext, ContextBuilder, DataQuality, PreferenceCompletionLevel,
    PreferenceDataAvailability, PromptTemplate, RetrievedDocument,
};
pub use question::{ConversationContext, ProcessedQuestion, QuestionCategory, QuestionIntent, QuestionProcessor};
pub use response::{ConversationMemory, GeneratedResponse, ResponseGenerator, ResponseQuality};
