pub mod mock_validator;
