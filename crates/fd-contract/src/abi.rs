//! Crowdfunding contract surface the client consumes.

use alloy_sol_types::sol;

sol! {
    function campaignCount() external view returns (uint256);

    function campaigns(uint256 id) external view returns (
        address owner,
        string title,
        string description,
        uint256 goal,
        uint256 fundsRaised,
        bool completed
    );

    function createCampaign(string title, string description, uint256 goal) external;

    function fundCampaign(uint256 id) external payable;

    function withdrawFunds(uint256 id) external;
}
