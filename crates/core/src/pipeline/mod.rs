pub mod bulk_enroll_use_case;
pub mod enroll_identity_use_case;
pub mod face_analyzer;
pub mod recognize_faces_use_case;

#[cfg(test)]
mod test_support;
